// ==============================================================================
// physics.rs — RAPIER WORLD HOSTING THE KARTS
// ==============================================================================
// Per step:
//   1) item boxes cool down
//   2) per kart: finite check -> ground ray -> item use -> controller.step -> apply
//   3) faulted karts respawn before integration
//   4) rapier pipeline step
//   5) dropped hazards appear; kill plane, hazard overlaps, item pickups
//
// Kart colliders have zero friction (Min combine) so the controller alone
// decides grip. X/Z rotations are locked; yaw comes from pose corrections.
// ==============================================================================

use rand::rngs::StdRng;
use rand::SeedableRng;
use rapier3d::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::KartError;
use crate::input::RawInput;
use crate::kart::{
    ActivationOutcome, GroundQuery, HazardSpawner, ItemGiver, ItemPool, KartController, KartEvent, KartTuning,
    PowerupBridge, Rot, Vec3,
};
use crate::settings::ServerSettings;
use crate::spawn::{SpawnGrid, SpawnPose};
use crate::vehicle::{apply_output, place_at, read_body, Kart, KART_HALF_EXTENTS, KART_MASS};

const GROUP_GROUND: Group = Group::GROUP_1;
const GROUP_KART: Group = Group::GROUP_2;
const GROUP_HAZARD: Group = Group::GROUP_3;

pub const HAZARD_RADIUS: f32 = 0.5;

// --------------------------------------------------
// ground raycast through the query pipeline
// --------------------------------------------------
struct RapierGround<'a> {
    bodies: &'a RigidBodySet,
    colliders: &'a ColliderSet,
    query: &'a QueryPipeline,
    filter: QueryFilter<'a>,
}

impl GroundQuery for RapierGround<'_> {
    fn cast_down(&self, origin: Vec3, max_distance: f32) -> Option<f32> {
        let ray = Ray::new(point![origin.x, origin.y, origin.z], vector![0.0, -1.0, 0.0]);
        self.query
            .cast_ray(self.bodies, self.colliders, &ray, max_distance, true, self.filter)
            .map(|(_, toi)| toi)
    }
}

/// Drops requested while karts are borrowed; inserted after the loop.
#[derive(Default)]
struct HazardQueue(Vec<(String, Vec3, Rot)>);

impl HazardSpawner for HazardQueue {
    fn spawn_hazard(&mut self, hazard: &str, position: Vec3, rotation: Rot) {
        self.0.push((hazard.to_string(), position, rotation));
    }
}

#[derive(Debug, Clone)]
pub struct Hazard {
    pub kind: String,
    pub body: RigidBodyHandle,
}

#[derive(Debug, Default)]
pub struct StepReport {
    pub faults: Vec<(String, KartError)>, // kart id -> rejected state
    pub respawned: Vec<String>,
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,
    pub karts: HashMap<String, Kart>,                  // kart id -> kart
    pub hazards: HashMap<ColliderHandle, Hazard>,      // sensor -> hazard
    pub item_boxes: Vec<ItemGiver>,
    pub item_pool: ItemPool,
    pub bridge: PowerupBridge,
    pub grid: SpawnGrid,
    pub tuning: KartTuning,
    pub kill_plane: f32,
    rng: StdRng,
}

impl PhysicsWorld {
    pub fn new(tuning: KartTuning, settings: &ServerSettings) -> Result<Self, KartError> {
        tuning.validate()?;

        let gravity = vector![0.0, -9.81, 0.0];
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // === Big static ground box, top surface at y = 0 ===
        let ground_rb = RigidBodyBuilder::fixed()
            .translation(vector![0.0, -0.5, 0.0])
            .build();
        let ground_handle = bodies.insert(ground_rb);
        let ground_collider = ColliderBuilder::cuboid(500.0, 0.5, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_KART))
            .friction(1.0)
            .restitution(0.0)
            .build();
        colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);

        let item_boxes = settings
            .item_boxes
            .iter()
            .map(|&[x, y, z]| ItemGiver::new(Vec3::new(x, y, z), settings.item_box_radius, settings.item_cooldown))
            .collect::<Vec<_>>();

        debug!(
            bodies = bodies.len(),
            colliders = colliders.len(),
            item_boxes = item_boxes.len(),
            "world created"
        );

        Ok(Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            karts: HashMap::new(),
            hazards: HashMap::new(),
            item_boxes,
            item_pool: ItemPool::default(),
            bridge: PowerupBridge::default(),
            grid: SpawnGrid::default(),
            tuning,
            kill_plane: settings.kill_plane,
            rng: StdRng::from_entropy(),
        })
    }

    /// Puts a kart on the next free grid slot. Re-spawning a known id keeps it.
    pub fn spawn_kart(&mut self, id: &str) -> Result<SpawnPose, KartError> {
        if let Some(kart) = self.karts.get(id) {
            return Ok(kart.spawn);
        }
        let controller = KartController::new(self.tuning)?;
        let (slot, pose) = self.grid.allocate(id);

        let rb = RigidBodyBuilder::dynamic()
            .translation(pose.position)
            .rotation(Vec3::y() * pose.yaw)
            .enabled_rotations(false, true, false)
            .ccd_enabled(true)
            .build();

        let [hx, hy, hz] = KART_HALF_EXTENTS;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .translation(vector![0.0, hy, 0.0]) // reference point at the bottom face
            .collision_groups(InteractionGroups::new(
                GROUP_KART,
                GROUP_GROUND | GROUP_KART | GROUP_HAZARD,
            ))
            .mass(KART_MASS)
            .friction(0.0)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .restitution(0.0)
            .build();

        let body = self.bodies.insert(rb);
        let collider = self.colliders.insert_with_parent(collider, body, &mut self.bodies);
        self.karts
            .insert(id.to_string(), Kart::new(id.to_string(), body, collider, controller, pose));

        info!(kart = %id, slot, x = pose.position.x, z = pose.position.z, "kart spawned");
        Ok(pose)
    }

    pub fn remove_kart(&mut self, id: &str) -> Result<(), KartError> {
        let kart = self
            .karts
            .remove(id)
            .ok_or_else(|| KartError::UnknownKart(id.to_string()))?;
        self.bodies.remove(
            kart.body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
        self.grid.release(id);
        info!(kart = %id, "kart removed");
        Ok(())
    }

    /// Stores input; it is read once per step.
    pub fn apply_input(&mut self, id: &str, raw: RawInput) -> Result<(), KartError> {
        let kart = self
            .karts
            .get_mut(id)
            .ok_or_else(|| KartError::UnknownKart(id.to_string()))?;
        kart.input.set(raw);
        Ok(())
    }

    /// Back to the spawn pose at rest, controller state cleared.
    pub fn respawn(&mut self, id: &str) -> Result<(), KartError> {
        let kart = self
            .karts
            .get_mut(id)
            .ok_or_else(|| KartError::UnknownKart(id.to_string()))?;
        if let Some(rb) = self.bodies.get_mut(kart.body) {
            place_at(rb, &kart.spawn);
        }
        kart.controller.reset();
        kart.events.push(KartEvent::Respawned);
        info!(kart = %id, "kart respawned");
        Ok(())
    }

    pub fn step(&mut self, dt: Real) -> Result<StepReport, KartError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(KartError::InvalidTimestep(dt));
        }

        let mut report = StepReport::default();
        let mut drops = HazardQueue::default();

        self.query_pipeline.update(&self.colliders);
        for giver in &mut self.item_boxes {
            giver.tick(dt);
        }

        // ------------------------------------------------------------
        // 1) Controllers
        // ------------------------------------------------------------
        for kart in self.karts.values_mut() {
            kart.events.clear();
            let Some(rb) = self.bodies.get(kart.body) else { continue };
            let body = read_body(rb);
            let control = kart.input.take_signal();

            // a broken body keeps its item; it is respawned below
            if let Err(err) = body.check_finite() {
                warn!(kart = %kart.id, error = %err, "kart state rejected");
                report.faults.push((kart.id.clone(), err));
                continue;
            }

            let filter = QueryFilter::default()
                .exclude_rigid_body(kart.body)
                .exclude_sensors()
                .groups(InteractionGroups::new(GROUP_KART, GROUP_GROUND));
            let ground = RapierGround {
                bodies: &self.bodies,
                colliders: &self.colliders,
                query: &self.query_pipeline,
                filter,
            };
            kart.contact = kart.probe.probe(&ground, body.position);

            if control.use_item && !kart.controller.is_spinning_out() {
                match self.bridge.activate(&mut kart.items, &mut kart.controller, &mut drops, &body) {
                    ActivationOutcome::Ignored => {}
                    ActivationOutcome::Boosted { item } | ActivationOutcome::Dropped { item, .. } => {
                        info!(kart = %kart.id, item = %item, "item used");
                        kart.controller.notify(KartEvent::ItemUsed { item });
                    }
                }
            }

            let out = match kart.controller.step(&body, &control, &kart.contact, dt) {
                Ok(out) => out,
                Err(err) => {
                    warn!(kart = %kart.id, error = %err, "kart state rejected");
                    report.faults.push((kart.id.clone(), err));
                    continue;
                }
            };

            for event in out.events.iter().filter(|e| !e.is_noisy()) {
                debug!(kart = %kart.id, event = event.label(), "kart event");
            }
            if let Some(rb) = self.bodies.get_mut(kart.body) {
                apply_output(rb, &out);
            }
            kart.events.extend(out.events);
        }

        // never integrate a body the controller refused
        let faulted: Vec<String> = report.faults.iter().map(|(id, _)| id.clone()).collect();
        for id in faulted {
            self.respawn(&id)?;
            report.respawned.push(id);
        }

        // ------------------------------------------------------------
        // 2) Integrate
        // ------------------------------------------------------------
        let hooks = ();
        let events = ();
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &hooks,
            &events,
        );

        for (kind, position, rotation) in drops.0 {
            self.spawn_hazard(&kind, position, rotation);
        }

        // ------------------------------------------------------------
        // 3) Kill plane, hazards, item boxes
        // ------------------------------------------------------------
        let mut fallen = Vec::new();
        let mut consumed = Vec::new();
        for kart in self.karts.values_mut() {
            let Some(rb) = self.bodies.get(kart.body) else { continue };
            let position = *rb.translation();

            if !position.iter().all(|c| c.is_finite()) || position.y < self.kill_plane {
                fallen.push(kart.id.clone());
                continue;
            }

            for (c1, c2, intersecting) in self.narrow_phase.intersection_pairs_with(kart.collider) {
                let other = if c1 == kart.collider { c2 } else { c1 };
                if !intersecting || consumed.contains(&other) {
                    continue;
                }
                let Some(hazard) = self.hazards.get(&other) else { continue };
                consumed.push(other);
                if kart.controller.trigger_spinout() {
                    info!(kart = %kart.id, hazard = %hazard.kind, "kart spun out");
                }
            }

            for giver in &mut self.item_boxes {
                if !giver.contains(position) {
                    continue;
                }
                if let Some(item) = giver.try_give(&mut kart.items, &self.item_pool, &mut self.rng) {
                    info!(kart = %kart.id, item = %item.name, "item acquired");
                    kart.events.push(KartEvent::ItemAcquired { item: item.name });
                }
            }
        }

        for handle in consumed {
            if let Some(hazard) = self.hazards.remove(&handle) {
                self.bodies.remove(
                    hazard.body,
                    &mut self.island_manager,
                    &mut self.colliders,
                    &mut self.joints,
                    &mut self.multibody_joints,
                    true,
                );
            }
        }
        for id in fallen {
            self.respawn(&id)?;
            report.respawned.push(id);
        }

        Ok(report)
    }

    pub fn kart(&self, id: &str) -> Option<&Kart> {
        self.karts.get(id)
    }

    pub fn body_of(&self, id: &str) -> Option<&RigidBody> {
        self.karts.get(id).and_then(|k| self.bodies.get(k.body))
    }
}

impl HazardSpawner for PhysicsWorld {
    /// Fixed sensor ball; a kart touching it spins out and the hazard is consumed.
    fn spawn_hazard(&mut self, hazard: &str, position: Vec3, rotation: Rot) {
        let rb = RigidBodyBuilder::fixed()
            .translation(position)
            .rotation(rotation.scaled_axis())
            .build();
        let collider = ColliderBuilder::ball(HAZARD_RADIUS)
            .sensor(true)
            .collision_groups(InteractionGroups::new(GROUP_HAZARD, GROUP_KART))
            .build();
        let body = self.bodies.insert(rb);
        let handle = self.colliders.insert_with_parent(collider, body, &mut self.bodies);
        self.hazards.insert(handle, Hazard { kind: hazard.to_string(), body });
        debug!(hazard = %hazard, x = position.x, z = position.z, "hazard dropped");
    }
}
