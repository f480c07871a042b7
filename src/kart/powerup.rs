// ==============================================================================
// powerup.rs — HELD ITEM, ACTIVATION BRIDGE, ITEM BOXES
// ==============================================================================
// One item at a time. Using it clears the slot and sets a single-use latch
// that only a fresh acquisition releases.
//
//   SelfBoost  -> BoostTarget::request_boost (same entry point as drift charge)
//   WorldDrop  -> HazardSpawner::spawn_hazard at the drop point; no kart forces
// ==============================================================================

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::types::{KartBody, Rot, Vec3};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemEffect {
    SelfBoost,
    WorldDrop { hazard: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Powerup {
    pub name: String,
    pub effect: ItemEffect,
}

impl Powerup {
    pub fn boost() -> Self {
        Self { name: "boost".into(), effect: ItemEffect::SelfBoost }
    }

    pub fn banana() -> Self {
        Self {
            name: "banana".into(),
            effect: ItemEffect::WorldDrop { hazard: "banana".into() },
        }
    }
}

// ============================================
// ----- slot ---------------------------------
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSlot {
    held: Option<Powerup>,
    used: bool,
}

impl ItemSlot {
    /// Stores `item` unless one is already held. Clears the use latch.
    pub fn acquire(&mut self, item: Powerup) -> bool {
        if self.held.is_some() {
            return false;
        }
        self.held = Some(item);
        self.used = false;
        true
    }

    pub fn held(&self) -> Option<&Powerup> {
        self.held.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_none()
    }

    pub fn is_latched(&self) -> bool {
        self.used
    }

    fn take_for_use(&mut self) -> Option<Powerup> {
        if self.used {
            return None;
        }
        let item = self.held.take()?;
        self.used = true;
        Some(item)
    }

    pub fn clear(&mut self) {
        self.held = None;
        self.used = false;
    }
}

// ============================================
// ----- bridge -------------------------------
// ============================================

pub trait BoostTarget {
    fn request_boost(&mut self);
}

pub trait HazardSpawner {
    fn spawn_hazard(&mut self, hazard: &str, position: Vec3, rotation: Rot);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    /// Nothing held, or the last use has not been followed by a new pickup.
    Ignored,
    Boosted { item: String },
    Dropped { item: String, hazard: String, position: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerupBridge {
    /// Kart-local drop point (behind the kart).
    pub drop_offset: Vec3,
}

impl Default for PowerupBridge {
    fn default() -> Self {
        Self { drop_offset: Vec3::new(0.0, 0.3, -2.0) }
    }
}

impl PowerupBridge {
    pub fn drop_point(&self, body: &KartBody) -> Vec3 {
        body.position + body.rotation * self.drop_offset
    }

    pub fn activate<B, H>(
        &self,
        slot: &mut ItemSlot,
        target: &mut B,
        spawner: &mut H,
        body: &KartBody,
    ) -> ActivationOutcome
    where
        B: BoostTarget + ?Sized,
        H: HazardSpawner + ?Sized,
    {
        let Some(item) = slot.take_for_use() else {
            return ActivationOutcome::Ignored;
        };
        match item.effect {
            ItemEffect::SelfBoost => {
                target.request_boost();
                ActivationOutcome::Boosted { item: item.name }
            }
            ItemEffect::WorldDrop { hazard } => {
                let position = self.drop_point(body);
                spawner.spawn_hazard(&hazard, position, body.rotation);
                ActivationOutcome::Dropped { item: item.name, hazard, position }
            }
        }
    }
}

// ============================================
// ----- acquisition --------------------------
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub struct ItemPool {
    items: Vec<Powerup>,
}

impl Default for ItemPool {
    fn default() -> Self {
        Self { items: vec![Powerup::boost(), Powerup::banana()] }
    }
}

impl ItemPool {
    pub fn new(items: Vec<Powerup>) -> Self {
        Self { items }
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Powerup> {
        self.items.choose(rng).cloned()
    }

    pub fn find(&self, name: &str) -> Option<Powerup> {
        self.items.iter().find(|p| p.name == name).cloned()
    }
}

/// Pickup volume; goes inactive for `cooldown` seconds after each give.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemGiver {
    pub position: Vec3,
    pub radius: f32,
    pub cooldown: f32,
    pub fixed_item: Option<String>,
    remaining: f32,
}

impl ItemGiver {
    pub fn new(position: Vec3, radius: f32, cooldown: f32) -> Self {
        Self { position, radius, cooldown, fixed_item: None, remaining: 0.0 }
    }

    pub fn with_item(mut self, name: impl Into<String>) -> Self {
        self.fixed_item = Some(name.into());
        self
    }

    pub fn tick(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    pub fn is_active(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (point - self.position).norm() <= self.radius
    }

    /// Gives an item if active and the slot is free; starts the cooldown on success.
    pub fn try_give<R: Rng + ?Sized>(
        &mut self,
        slot: &mut ItemSlot,
        pool: &ItemPool,
        rng: &mut R,
    ) -> Option<Powerup> {
        if !self.is_active() || !slot.is_empty() {
            return None;
        }
        let item = match &self.fixed_item {
            Some(name) => pool.find(name)?,
            None => pool.roll(rng)?,
        };
        if !slot.acquire(item.clone()) {
            return None;
        }
        self.remaining = self.cooldown;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct Boosts(u32);
    impl BoostTarget for Boosts {
        fn request_boost(&mut self) {
            self.0 += 1;
        }
    }

    #[derive(Default)]
    struct Drops(Vec<(String, Vec3)>);
    impl HazardSpawner for Drops {
        fn spawn_hazard(&mut self, hazard: &str, position: Vec3, _rotation: Rot) {
            self.0.push((hazard.to_string(), position));
        }
    }

    fn body() -> KartBody {
        KartBody::at_rest(Vec3::new(1.0, 0.0, 5.0), Rot::identity())
    }

    #[test]
    fn world_drop_twice_spawns_once() {
        let bridge = PowerupBridge::default();
        let mut slot = ItemSlot::default();
        let (mut boosts, mut drops) = (Boosts::default(), Drops::default());

        assert!(slot.acquire(Powerup::banana()));
        let first = bridge.activate(&mut slot, &mut boosts, &mut drops, &body());
        let second = bridge.activate(&mut slot, &mut boosts, &mut drops, &body());

        assert!(matches!(first, ActivationOutcome::Dropped { .. }));
        assert_eq!(second, ActivationOutcome::Ignored);
        assert_eq!(drops.0.len(), 1);
        assert_eq!(boosts.0, 0);
        // behind the kart: -Z in kart space
        assert_eq!(drops.0[0].1, Vec3::new(1.0, 0.3, 3.0));
    }

    #[test]
    fn self_boost_calls_target() {
        let bridge = PowerupBridge::default();
        let mut slot = ItemSlot::default();
        let (mut boosts, mut drops) = (Boosts::default(), Drops::default());

        slot.acquire(Powerup::boost());
        let outcome = bridge.activate(&mut slot, &mut boosts, &mut drops, &body());
        assert_eq!(outcome, ActivationOutcome::Boosted { item: "boost".into() });
        assert_eq!(boosts.0, 1);
        assert!(drops.0.is_empty());
        assert!(slot.is_empty());
        assert!(slot.is_latched());
    }

    #[test]
    fn empty_slot_is_ignored() {
        let bridge = PowerupBridge::default();
        let mut slot = ItemSlot::default();
        let (mut boosts, mut drops) = (Boosts::default(), Drops::default());
        assert_eq!(
            bridge.activate(&mut slot, &mut boosts, &mut drops, &body()),
            ActivationOutcome::Ignored
        );
    }

    #[test]
    fn no_acquisition_while_holding() {
        let mut slot = ItemSlot::default();
        assert!(slot.acquire(Powerup::boost()));
        assert!(!slot.acquire(Powerup::banana()));
        assert_eq!(slot.held(), Some(&Powerup::boost()));
    }

    #[test]
    fn reacquire_releases_latch() {
        let bridge = PowerupBridge::default();
        let mut slot = ItemSlot::default();
        let (mut boosts, mut drops) = (Boosts::default(), Drops::default());

        slot.acquire(Powerup::boost());
        bridge.activate(&mut slot, &mut boosts, &mut drops, &body());
        slot.acquire(Powerup::boost());
        bridge.activate(&mut slot, &mut boosts, &mut drops, &body());
        assert_eq!(boosts.0, 2);
    }

    #[test]
    fn giver_respects_cooldown_and_held_item() {
        let pool = ItemPool::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut giver = ItemGiver::new(Vec3::zeros(), 1.5, 2.0).with_item("banana");
        let mut slot = ItemSlot::default();

        assert_eq!(giver.try_give(&mut slot, &pool, &mut rng), Some(Powerup::banana()));
        assert!(!giver.is_active());

        // full slot: nothing given, cooldown untouched
        let mut other = ItemSlot::default();
        other.acquire(Powerup::boost());
        giver.tick(2.0);
        assert_eq!(giver.try_give(&mut other, &pool, &mut rng), None);
        assert!(giver.is_active());

        let mut fresh = ItemSlot::default();
        assert!(giver.try_give(&mut fresh, &pool, &mut rng).is_some());
        giver.tick(1.0);
        let mut late = ItemSlot::default();
        assert_eq!(giver.try_give(&mut late, &pool, &mut rng), None);
    }

    #[test]
    fn pool_rolls_from_its_items() {
        let pool = ItemPool::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let item = pool.roll(&mut rng).unwrap();
            assert!(item == Powerup::boost() || item == Powerup::banana());
        }
        assert_eq!(ItemPool::new(Vec::new()).roll(&mut rng), None);
    }
}
