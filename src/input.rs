use serde::{Deserialize, Serialize};

use crate::kart::ControlSignal;

/// Raw axes/buttons as a client sends them. The item button is its held state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInput {
    pub steer: f32,
    pub throttle: f32,
    pub drift: bool,
    pub use_item: bool,
}

/// Turns the latest raw input into one `ControlSignal` per tick.
///
/// Axes are clamped to [-1, 1] and non-finite values read as 0. The item button
/// becomes an edge: a press is reported on exactly one tick, even if it was
/// released again before that tick ran.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputLatch {
    steer: f32,
    throttle: f32,
    drift_held: bool,
    item_down: bool,
    item_pending: bool,
}

fn axis(value: f32) -> f32 {
    if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 }
}

impl InputLatch {
    pub fn set(&mut self, raw: RawInput) {
        self.steer = axis(raw.steer);
        self.throttle = axis(raw.throttle);
        self.drift_held = raw.drift;
        if raw.use_item && !self.item_down {
            self.item_pending = true;
        }
        self.item_down = raw.use_item;
    }

    /// Signal for this tick; consumes a pending item press.
    pub fn take_signal(&mut self) -> ControlSignal {
        ControlSignal {
            steer: self.steer,
            throttle: self.throttle,
            drift_held: self.drift_held,
            use_item: std::mem::take(&mut self.item_pending),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(use_item: bool) -> RawInput {
        RawInput { use_item, ..RawInput::default() }
    }

    #[test]
    fn axes_are_clamped_and_sanitised() {
        let mut latch = InputLatch::default();
        latch.set(RawInput { steer: 3.0, throttle: f32::NAN, drift: true, use_item: false });
        let signal = latch.take_signal();
        assert_eq!(signal.steer, 1.0);
        assert_eq!(signal.throttle, 0.0);
        assert!(signal.drift_held);
    }

    #[test]
    fn held_button_fires_once() {
        let mut latch = InputLatch::default();
        latch.set(press(true));
        assert!(latch.take_signal().use_item);
        latch.set(press(true));
        assert!(!latch.take_signal().use_item);
        assert!(!latch.take_signal().use_item);

        latch.set(press(false));
        latch.set(press(true));
        assert!(latch.take_signal().use_item);
    }

    #[test]
    fn tap_between_ticks_is_kept() {
        let mut latch = InputLatch::default();
        latch.set(press(true));
        latch.set(press(false));
        assert!(latch.take_signal().use_item);
        assert!(!latch.take_signal().use_item);
    }
}
