use serde::{Deserialize, Serialize};

use super::types::DriftDirection;

/// Notifications for particle/audio/UI collaborators. Drained once per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KartEvent {
    DriftStarted { direction: DriftDirection },
    DriftEnded { charge: f32, boosted: bool },
    DriftChargeChanged { charge: f32 },
    BoostStarted { duration: f32, restarted: bool },
    BoostEnded,
    SpinoutStarted { duration: f32 },
    SpinoutEnded,
    ItemAcquired { item: String },
    ItemUsed { item: String },
    Respawned,
}

impl KartEvent {
    /// Name used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            KartEvent::DriftStarted { .. } => "drift_started",
            KartEvent::DriftEnded { .. } => "drift_ended",
            KartEvent::DriftChargeChanged { .. } => "drift_charge_changed",
            KartEvent::BoostStarted { .. } => "boost_started",
            KartEvent::BoostEnded => "boost_ended",
            KartEvent::SpinoutStarted { .. } => "spinout_started",
            KartEvent::SpinoutEnded => "spinout_ended",
            KartEvent::ItemAcquired { .. } => "item_acquired",
            KartEvent::ItemUsed { .. } => "item_used",
            KartEvent::Respawned => "respawned",
        }
    }

    /// Charge updates fire every drifting tick; callers usually skip them in logs.
    pub fn is_noisy(&self) -> bool {
        matches!(self, KartEvent::DriftChargeChanged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&KartEvent::DriftStarted {
            direction: DriftDirection::Left,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"drift_started","direction":"left"}"#);

        let json = serde_json::to_string(&KartEvent::BoostEnded).unwrap();
        assert_eq!(json, r#"{"type":"boost_ended"}"#);
    }
}
