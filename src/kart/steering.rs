// ==============================================================================
// steering.rs — STEER SMOOTHING (EXPONENTIAL, TIMESTEP-INVARIANT)
// ==============================================================================
// smoothed += (target - smoothed) * (1 - exp(-k * dt))
//
// Two ticks of dt/2 land where one tick of dt does, so response does not depend
// on the physics rate. alpha stays in (0, 1) for any dt > 0, which rules out
// overshoot for a constant target.
// ==============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringFilter {
    response: f32, // k, 1/s
    value: f32,
    rate: f32,     // d(value)/dt over the last update
}

impl SteeringFilter {
    pub fn new(response: f32) -> Self {
        Self { response, value: 0.0, rate: 0.0 }
    }

    /// Blend factor for one tick of length `dt`.
    #[inline]
    pub fn alpha(&self, dt: f32) -> f32 {
        1.0 - (-self.response * dt).exp()
    }

    pub fn update(&mut self, target: f32, dt: f32) -> f32 {
        let prev = self.value;
        self.value += (target - self.value) * self.alpha(dt);
        self.rate = if dt > 0.0 { (self.value - prev) / dt } else { 0.0 };
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.rate = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn approaches_target_from_rest() {
        let mut filter = SteeringFilter::new(12.0);
        let first = filter.update(1.0, 1.0 / 60.0);
        assert!(first > 0.0 && first < 1.0);
        assert!(filter.rate() > 0.0);

        for _ in 0..120 {
            filter.update(1.0, 1.0 / 60.0);
        }
        assert!((filter.value() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn reset_clears_state() {
        let mut filter = SteeringFilter::new(12.0);
        filter.update(-1.0, 0.1);
        filter.reset();
        assert_eq!(filter.value(), 0.0);
        assert_eq!(filter.rate(), 0.0);
    }

    proptest! {
        /// Same simulated time at two rates ends at the same value.
        #[test]
        fn prop_timestep_invariant(
            dt in (1.0f32 / 240.0)..(1.0f32 / 15.0),
            target in -1.0f32..1.0f32,
            ticks in 1usize..60,
        ) {
            let mut coarse = SteeringFilter::new(12.0);
            let mut fine = SteeringFilter::new(12.0);
            for _ in 0..ticks {
                coarse.update(target, dt);
                fine.update(target, dt * 0.5);
                fine.update(target, dt * 0.5);
            }
            prop_assert!((coarse.value() - fine.value()).abs() < 1e-4);
        }

        /// A constant target is approached from one side and never crossed.
        #[test]
        fn prop_never_overshoots(
            dt in (1.0f32 / 240.0)..(1.0f32 / 15.0),
            target in -1.0f32..1.0f32,
        ) {
            let mut filter = SteeringFilter::new(12.0);
            let mut prev_gap = target.abs();
            for _ in 0..400 {
                filter.update(target, dt);
                let gap = target - filter.value();
                prop_assert!(gap * target >= -1e-6);
                prop_assert!(gap.abs() <= prev_gap + 1e-6);
                prev_gap = gap.abs();
            }
        }

        /// Converges within ceil(ln(1/tol) / (k dt)) ticks.
        #[test]
        fn prop_converges_in_bounded_ticks(dt in (1.0f32 / 240.0)..(1.0f32 / 15.0)) {
            let k = 12.0f32;
            let tol = 1e-3f32;
            let bound = ((1.0 / tol).ln() / (k * dt)).ceil() as usize + 1;
            let mut filter = SteeringFilter::new(k);
            for _ in 0..bound {
                filter.update(1.0, dt);
            }
            prop_assert!((1.0 - filter.value()) <= tol * 1.01);
        }
    }
}
