// ==============================================================================
// drift.rs — DRIFT STATE MACHINE (MODE, CHARGE, HOP)
// ==============================================================================
// Evaluated once per tick, in order:
//   Idle     -> Drifting : grounded, allowed, held, |steer| > min, speed > min,
//                          throttle > 0. Direction latched from the steer sign.
//   Drifting -> Idle     : released, airborne or throttle <= 0. A full charge
//                          requests a boost; charge resets to 0 either way.
//   Drifting (staying)   : elapsed += dt, clamped to the required duration.
//
// The entry tick does not accumulate. Boosting is not a mode here: the machine
// only asks for a boost and the controller owns the impulse.
// ==============================================================================

use serde::{Deserialize, Serialize};

use super::boost::HopImpulse;
use super::tuning::KartTuning;
use super::types::{DriftDirection, DriftMode};

/// Elapsed time this close to the required duration counts as full.
/// Summing many small f32 ticks never lands exactly on the threshold.
const CHARGE_EPSILON: f32 = 1e-4;

/// Everything the machine reads on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftInputs {
    pub grounded: bool,
    pub drift_held: bool,
    pub steer: f32,
    pub throttle: f32,
    pub forward_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftTransition {
    None,
    Entered(DriftDirection),
    Exited { charge: f32, boost: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftStateMachine {
    mode: DriftMode,
    direction: Option<DriftDirection>,
    elapsed: f32, // s, in [0, required]
    hop: Option<HopImpulse>,
}

impl DriftStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_enter(tuning: &KartTuning, inputs: &DriftInputs) -> bool {
        inputs.grounded
            && tuning.drift_allowed
            && inputs.drift_held
            && inputs.steer.abs() > tuning.drift_min_steer
            && inputs.forward_speed > tuning.drift_min_speed
            && inputs.throttle > 0.0
    }

    pub fn must_exit(inputs: &DriftInputs) -> bool {
        !inputs.drift_held || !inputs.grounded || inputs.throttle <= 0.0
    }

    pub fn update(&mut self, tuning: &KartTuning, inputs: &DriftInputs, dt: f32) -> DriftTransition {
        match self.mode {
            DriftMode::Idle => {
                if !Self::can_enter(tuning, inputs) {
                    return DriftTransition::None;
                }
                let direction = DriftDirection::from_steer(inputs.steer);
                self.mode = DriftMode::Drifting;
                self.direction = Some(direction);
                self.elapsed = 0.0;
                if tuning.hop_enabled() {
                    self.hop = Some(HopImpulse::new(tuning.drift_hop_duration, tuning.drift_hop_force));
                }
                DriftTransition::Entered(direction)
            }
            DriftMode::Drifting => {
                if Self::must_exit(inputs) {
                    let charge = self.charge(tuning);
                    let boost = self.is_charged(tuning);
                    self.end();
                    return DriftTransition::Exited { charge, boost };
                }
                let required = tuning.drift_required_duration;
                self.elapsed = (self.elapsed + dt).min(required);
                if required - self.elapsed <= CHARGE_EPSILON {
                    self.elapsed = required;
                }
                DriftTransition::None
            }
        }
    }

    /// Ends a drift without a boost. Returns the discarded charge if one was running.
    pub fn cancel(&mut self, tuning: &KartTuning) -> Option<f32> {
        if self.mode != DriftMode::Drifting {
            return None;
        }
        let charge = self.charge(tuning);
        self.end();
        self.hop = None;
        Some(charge)
    }

    fn end(&mut self) {
        self.mode = DriftMode::Idle;
        self.direction = None;
        self.elapsed = 0.0;
    }

    /// Upward acceleration for this tick (0 once the hop has run out).
    pub fn tick_hop(&mut self, dt: f32) -> f32 {
        let Some(hop) = self.hop.as_mut() else { return 0.0 };
        let accel = hop.tick(dt);
        if hop.is_expired() {
            self.hop = None;
        }
        accel
    }

    pub fn mode(&self) -> DriftMode {
        self.mode
    }

    pub fn is_drifting(&self) -> bool {
        self.mode == DriftMode::Drifting
    }

    pub fn direction(&self) -> Option<DriftDirection> {
        self.direction
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Normalised charge in [0, 1].
    pub fn charge(&self, tuning: &KartTuning) -> f32 {
        (self.elapsed / tuning.drift_required_duration).clamp(0.0, 1.0)
    }

    pub fn is_charged(&self, tuning: &KartTuning) -> bool {
        self.elapsed >= tuning.drift_required_duration
    }

    pub fn hop_active(&self) -> bool {
        self.hop.is_some()
    }
}
