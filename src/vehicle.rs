use rapier3d::prelude::*;

use crate::input::InputLatch;
use crate::kart::{
    ContactState, GroundProbe, ItemSlot, KartBody, KartController, KartEvent, Rot, StepOutput, Vec3,
};
use crate::spawn::SpawnPose;

pub const KART_MASS: f32 = 150.0;                       // kg
pub const KART_HALF_EXTENTS: [f32; 3] = [0.6, 0.3, 1.0]; // [hx, hy, hz] meters

pub struct Kart {
    pub id: String,
    pub body: RigidBodyHandle,         // the chassis body
    pub collider: ColliderHandle,
    pub controller: KartController,    // drift / boost / spinout state
    pub probe: GroundProbe,
    pub input: InputLatch,             // latest client input
    pub items: ItemSlot,
    pub spawn: SpawnPose,              // where respawns put us
    pub contact: ContactState,         // last probe result
    pub events: Vec<KartEvent>,        // raised during the last world step
}

impl Kart {
    pub fn new(id: String, body: RigidBodyHandle, collider: ColliderHandle, controller: KartController, spawn: SpawnPose) -> Self {
        let probe = GroundProbe::from_tuning(controller.tuning());
        Self {
            id,
            body,
            collider,
            controller,
            probe,
            input: InputLatch::default(),
            items: ItemSlot::default(),
            spawn,
            contact: ContactState::airborne(probe.airborne_drag),
            events: Vec::new(),
        }
    }
}

/// Read-only copy of the rapier body for the controller.
pub fn read_body(rb: &RigidBody) -> KartBody {
    KartBody {
        position: *rb.translation(),
        rotation: *rb.rotation(),
        linvel: *rb.linvel(),
        angvel: *rb.angvel(),
    }
}

/// Applies controller requests to the rapier body.
///
/// `add_force` accumulates across steps in rapier, so forces are reset first.
/// Acceleration-mode requests are scaled by the body mass.
pub fn apply_output(rb: &mut RigidBody, out: &StepOutput) {
    rb.reset_forces(true);
    rb.set_linear_damping(out.linear_damping);
    if let Some(v) = out.velocity {
        rb.set_linvel(v, true);
    }
    if let Some(w) = out.angular_velocity {
        rb.set_angvel(w, true);
    }
    if out.rotation_delta != Rot::identity() {
        let rotation = *rb.rotation() * out.rotation_delta;
        rb.set_rotation(rotation, true);
    }
    let mass = rb.mass();
    for force in &out.forces {
        rb.add_force(force.as_force(mass), true);
    }
}

/// Teleports the body to `pose` with no motion left over.
pub fn place_at(rb: &mut RigidBody, pose: &SpawnPose) {
    rb.reset_forces(true);
    rb.set_translation(pose.position, true);
    rb.set_rotation(pose.rotation(), true);
    rb.set_linvel(Vec3::zeros(), true);
    rb.set_angvel(Vec3::zeros(), true);
}
