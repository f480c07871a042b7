//! Countdown effects carried across ticks (boost, drift hop, spinout).
//!
//! Each effect is a plain value updated once per `step`; nothing is suspended
//! between ticks, so a controller snapshot captures them completely.

use serde::{Deserialize, Serialize};

/// A force that lasts a fixed amount of simulated time.
///
/// `consume(dt)` returns how much of `dt` the effect covered. Scaling the
/// per-tick acceleration by `covered / dt` makes the delivered impulse exactly
/// `magnitude * duration` whatever the tick length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedImpulse {
    pub remaining_time: f32,  // s
    pub force_magnitude: f32, // m/s^2 (acceleration mode)
}

/// Forward push started by a full drift charge or a boost item.
pub type BoostImpulse = TimedImpulse;

/// Short upward push on drift entry.
pub type HopImpulse = TimedImpulse;

impl TimedImpulse {
    pub fn new(duration: f32, force_magnitude: f32) -> Self {
        Self { remaining_time: duration, force_magnitude }
    }

    pub fn consume(&mut self, dt: f32) -> f32 {
        let covered = self.remaining_time.min(dt).max(0.0);
        self.remaining_time -= covered;
        covered
    }

    /// Acceleration to request for a tick of length `dt`.
    pub fn tick(&mut self, dt: f32) -> f32 {
        if dt <= 0.0 {
            return 0.0;
        }
        self.force_magnitude * self.consume(dt) / dt
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_time <= 0.0
    }
}

/// Loss of control for a fixed time; yaw spins at a constant rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spinout {
    pub remaining_time: f32,
    pub rate: f32, // rad/s
}

impl Spinout {
    pub fn new(duration: f32, rate_deg: f32) -> Self {
        Self {
            remaining_time: duration,
            rate: rate_deg.to_radians(),
        }
    }

    /// Yaw (radians) for this tick.
    pub fn tick(&mut self, dt: f32) -> f32 {
        let covered = self.remaining_time.min(dt).max(0.0);
        self.remaining_time -= covered;
        self.rate * covered
    }

    pub fn is_over(&self) -> bool {
        self.remaining_time <= 0.0
    }
}
