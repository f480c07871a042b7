//! Engine-agnostic kart core: tuning, steering, drift, boost, controller,
//! ground probe contract and item bridge. Nothing in here knows about rapier.

pub mod boost;
pub mod controller;
pub mod drift;
pub mod events;
pub mod powerup;
pub mod probe;
pub mod sim;
pub mod steering;
pub mod tuning;
pub mod types;

pub use controller::{KartController, StepOutput};
pub use events::KartEvent;
pub use powerup::{ActivationOutcome, BoostTarget, HazardSpawner, ItemGiver, ItemPool, ItemSlot, Powerup, PowerupBridge};
pub use probe::{FlatGround, GroundProbe, GroundQuery};
pub use tuning::{KartTuning, ARCADE, CLASSIC};
pub use types::*;
