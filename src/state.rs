use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::error;

use crate::kart::{KartEvent, KartStatus};
use crate::physics::PhysicsWorld;

#[derive(Debug, Clone, Serialize)]
pub struct KartSnapshot {
    pub id: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion i, j, k, w
    pub speed: f32,         // forward m/s
    pub grounded: bool,
    pub status: KartStatus,
    pub drift_charge: f32,
    pub held_item: Option<String>,
    pub events: Vec<KartEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub karts: Vec<KartSnapshot>,
}

impl Snapshot {
    pub fn capture(tick: u64, world: &PhysicsWorld) -> Self {
        let mut karts = Vec::with_capacity(world.karts.len());
        for kart in world.karts.values() {
            let Some(rb) = world.bodies.get(kart.body) else { continue };
            let pos = rb.translation();
            let rot = rb.rotation();
            let forward = rot * crate::kart::Vec3::z();
            karts.push(KartSnapshot {
                id: kart.id.clone(),
                position: [pos.x, pos.y, pos.z],
                rotation: [rot.i, rot.j, rot.k, rot.w],
                speed: rb.linvel().dot(&forward),
                grounded: kart.contact.grounded,
                status: kart.controller.status(),
                drift_charge: kart.controller.drift_charge(),
                held_item: kart.items.held().map(|p| p.name.clone()),
                events: kart.events.clone(),
            });
        }
        karts.sort_by(|a, b| a.id.cmp(&b.id));
        Self { tick, karts }
    }
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: HashMap<String, UnboundedSender<String>>, // kart id -> outgoing
}

impl Default for SharedGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedGameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, kart_id: &str, tx: UnboundedSender<String>) {
        self.clients.insert(kart_id.to_string(), tx);
    }

    pub fn remove_client(&mut self, kart_id: &str) {
        self.clients.remove(kart_id);
    }

    /// Build and send a snapshot of all karts to all clients.
    pub fn broadcast_snapshot(&self, world: &PhysicsWorld) {
        let json = match serde_json::to_string(&Snapshot::capture(self.tick, world)) {
            Ok(json) => json,
            Err(err) => {
                error!(tick = self.tick, error = %err, "snapshot serialization failed");
                return;
            }
        };
        for tx in self.clients.values() {
            let _ = tx.send(json.clone());
        }
    }
}
