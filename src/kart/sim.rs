//! Headless point-mass integrator.
//!
//! Stands in for the rigid-body engine when driving the controller without a
//! physics world: applies a `StepOutput` to a `KartBody` over a flat ground
//! plane. Order matches the rapier glue in `physics.rs`:
//! velocity correction, forces, gravity, linear damping, pose.

use crate::error::KartError;

use super::controller::{KartController, StepOutput};
use super::probe::{FlatGround, GroundProbe};
use super::types::{ContactState, ControlSignal, KartBody, Vec3};

pub fn integrate(body: &mut KartBody, out: &StepOutput, mass: f32, gravity: Vec3, grounded: bool, dt: f32) {
    let mut v = out.velocity.unwrap_or(body.linvel);
    for force in &out.forces {
        v += force.as_acceleration(mass) * dt;
    }
    if !grounded {
        v += gravity * dt;
    }
    // same damping law as rapier: v *= 1 / (1 + dt * d)
    v /= 1.0 + dt * out.linear_damping;
    if grounded && v.y < 0.0 {
        v.y = 0.0;
    }

    body.linvel = v;
    body.angvel = out.angular_velocity.unwrap_or(body.angvel);
    body.position += v * dt;
    body.rotation *= out.rotation_delta;
}

/// Controller + body + flat ground, advanced together.
#[derive(Debug, Clone)]
pub struct HeadlessKart {
    pub controller: KartController,
    pub body: KartBody,
    pub probe: GroundProbe,
    pub ground: FlatGround,
    pub mass: f32,
    pub gravity: Vec3,
}

impl HeadlessKart {
    pub fn new(controller: KartController, body: KartBody) -> Self {
        let probe = GroundProbe::from_tuning(controller.tuning());
        Self {
            controller,
            body,
            probe,
            ground: FlatGround { height: 0.0 },
            mass: 150.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }

    pub fn contact(&self) -> ContactState {
        self.probe.probe(&self.ground, self.body.position)
    }

    pub fn tick(&mut self, control: &ControlSignal, dt: f32) -> Result<StepOutput, KartError> {
        let contact = self.contact();
        let out = self.controller.step(&self.body, control, &contact, dt)?;
        integrate(&mut self.body, &out, self.mass, self.gravity, contact.grounded, dt);
        if contact.grounded && self.body.position.y < self.ground.height {
            self.body.position.y = self.ground.height;
        }
        Ok(out)
    }

    pub fn forward_speed(&self) -> f32 {
        self.body.forward_speed()
    }
}
