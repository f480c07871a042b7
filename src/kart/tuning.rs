// ==============================================================================
// tuning.rs — KART TUNING (PLAIN NUMERIC / BOOLEAN TUNABLES)
// ------------------------------------------------------------------------------
// Every constant that differs between the two driving profiles lives here, so
// one controller covers both. Values only scale behaviour; none switches to an
// alternate algorithm.
//
// Validation happens once, at construction time. Nothing is clamped at runtime:
// a bad value is a tuning mistake and is reported as such.
//
// Loading layers (later wins):
//   preset (CLASSIC / ARCADE) -> optional YAML file -> KART_* env variables
// ==============================================================================

use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};

use crate::error::KartError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KartTuning {
    // --- Longitudinal ---
    pub acceleration: f32,            // m/s^2 at full throttle
    pub top_speed: f32,               // m/s, forward
    pub reverse_cap: f32,             // m/s, backward
    pub accel_gain_at_rest: f32,      // falloff curve gain at 0 m/s
    pub accel_gain_at_top_speed: f32, // falloff curve gain at top_speed (minimum)
    pub engine_brake_drag: f32,       // 1/s, off-pedal on the ground
    pub drift_drag_factor: f32,       // engine brake multiplier while drifting

    // --- Steering ---
    pub turn_rate_base: f32,          // deg/s at full speed
    pub turn_floor_factor: f32,       // min fraction of turn rate at low speed
    pub steer_response: f32,          // 1/s, exponential smoothing rate
    pub drift_turn_multiplier: f32,   // > 1
    pub drift_control_factor: f32,    // 0 = locked to drift side, 1 = raw steer
    pub steer_slip: f32,              // extra lateral retain per unit |steer|

    // --- Grip (fraction of lateral velocity kept per 1/60 s) ---
    pub grounded_grip_retain: f32,
    pub drift_grip_retain: f32,
    pub drift_slip_accel: f32,        // m/s^2 along drift side

    // --- Drift ---
    pub drift_allowed: bool,
    pub drift_min_steer: f32,         // |steer| must exceed this
    pub drift_min_speed: f32,         // forward m/s must exceed this
    pub drift_required_duration: f32, // s of drift for a full charge
    pub drift_hop_force: f32,         // m/s^2 upward
    pub drift_hop_duration: f32,      // s, 0 disables the hop

    // --- Boost ---
    pub boost_multiplier: f32,        // x acceleration
    pub boost_duration: f32,          // s

    // --- Stability ---
    pub downforce: f32,               // m/s^2 while grounded
    pub angular_retain: f32,          // angular velocity kept per 1/60 s on ground

    // --- Ground probe / drag ---
    pub probe_height: f32,            // ray origin above the reference point
    pub probe_distance: f32,          // ray length
    pub grounded_drag: f32,
    pub grounded_drag_multiplier: f32,
    pub airborne_drag: f32,

    // --- Spinout ---
    pub spinout_duration: f32,        // s
    pub spinout_rate: f32,            // deg/s yaw
    pub spinout_velocity_retain: f32, // velocity kept on entry
}

/// Baseline kart: grippy, moderate top speed.
pub const CLASSIC: KartTuning = KartTuning {
    acceleration: 30.0,
    top_speed: 20.0,
    reverse_cap: 10.0,
    accel_gain_at_rest: 1.5,
    accel_gain_at_top_speed: 1.0,
    engine_brake_drag: 1.0,
    drift_drag_factor: 0.3,

    turn_rate_base: 100.0,
    turn_floor_factor: 0.3,
    steer_response: 12.0,
    drift_turn_multiplier: 2.0,
    drift_control_factor: 0.5,
    steer_slip: 0.0,

    grounded_grip_retain: 0.1,
    drift_grip_retain: 0.4,
    drift_slip_accel: 2.0,

    drift_allowed: true,
    drift_min_steer: 0.1,
    drift_min_speed: 5.0,
    drift_required_duration: 2.5,
    drift_hop_force: 0.0,
    drift_hop_duration: 0.0,

    boost_multiplier: 10.0,
    boost_duration: 1.5,

    downforce: 0.0,
    angular_retain: 0.98,

    probe_height: 0.2,
    probe_distance: 0.6,
    grounded_drag: 1.0,
    grounded_drag_multiplier: 1.0,
    airborne_drag: 0.0,

    spinout_duration: 1.2,
    spinout_rate: 720.0,
    spinout_velocity_retain: 0.5,
};

/// Snappier profile: shorter charge, physical hop, downforce, looser slide.
pub const ARCADE: KartTuning = KartTuning {
    acceleration: 34.0,
    top_speed: 24.0,
    reverse_cap: 8.0,
    accel_gain_at_rest: 1.6,
    accel_gain_at_top_speed: 0.6,
    engine_brake_drag: 0.8,
    drift_drag_factor: 0.3,

    turn_rate_base: 110.0,
    turn_floor_factor: 0.35,
    steer_response: 14.0,
    drift_turn_multiplier: 1.8,
    drift_control_factor: 0.4,
    steer_slip: 0.05,

    grounded_grip_retain: 0.15,
    drift_grip_retain: 0.45,
    drift_slip_accel: 2.5,

    drift_allowed: true,
    drift_min_steer: 0.1,
    drift_min_speed: 5.0,
    drift_required_duration: 1.5,
    drift_hop_force: 25.0,
    drift_hop_duration: 0.12,

    boost_multiplier: 0.8,
    boost_duration: 1.2,

    downforce: 9.0,
    angular_retain: 0.95,

    probe_height: 0.2,
    probe_distance: 0.6,
    grounded_drag: 0.6,
    grounded_drag_multiplier: 1.0,
    airborne_drag: 0.05,

    spinout_duration: 1.0,
    spinout_rate: 540.0,
    spinout_velocity_retain: 0.4,
};

impl Default for KartTuning {
    fn default() -> Self {
        CLASSIC
    }
}

impl KartTuning {
    pub fn preset(name: &str) -> Result<KartTuning, KartError> {
        match name.to_ascii_lowercase().as_str() {
            "classic" => Ok(CLASSIC),
            "arcade" => Ok(ARCADE),
            other => Err(KartError::tuning("profile", format!("unknown preset `{other}`"))),
        }
    }

    /// Preset, then `file` (YAML, optional), then `KART_*` env overrides.
    pub fn load(profile: &str, file: Option<&str>) -> Result<KartTuning, KartError> {
        Self::load_with_env(profile, file, std::env::vars())
    }

    /// `load` with an explicit set of environment variables.
    pub fn load_with_env(
        profile: &str,
        file: Option<&str>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<KartTuning, KartError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::preset(profile)?)?);
        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let env = Environment::with_prefix("KART")
            .try_parsing(true)
            .source(Some(tuning_vars(vars)));
        let tuning: KartTuning = builder.add_source(env).build()?.try_deserialize()?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Overlays a YAML document on top of `self`.
    pub fn with_yaml(&self, yaml: &str) -> Result<KartTuning, KartError> {
        let tuning: KartTuning = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), KartError> {
        let numbers = [
            ("acceleration", self.acceleration),
            ("top_speed", self.top_speed),
            ("reverse_cap", self.reverse_cap),
            ("accel_gain_at_rest", self.accel_gain_at_rest),
            ("accel_gain_at_top_speed", self.accel_gain_at_top_speed),
            ("engine_brake_drag", self.engine_brake_drag),
            ("drift_drag_factor", self.drift_drag_factor),
            ("turn_rate_base", self.turn_rate_base),
            ("turn_floor_factor", self.turn_floor_factor),
            ("steer_response", self.steer_response),
            ("drift_turn_multiplier", self.drift_turn_multiplier),
            ("drift_control_factor", self.drift_control_factor),
            ("steer_slip", self.steer_slip),
            ("grounded_grip_retain", self.grounded_grip_retain),
            ("drift_grip_retain", self.drift_grip_retain),
            ("drift_slip_accel", self.drift_slip_accel),
            ("drift_min_steer", self.drift_min_steer),
            ("drift_min_speed", self.drift_min_speed),
            ("drift_required_duration", self.drift_required_duration),
            ("drift_hop_force", self.drift_hop_force),
            ("drift_hop_duration", self.drift_hop_duration),
            ("boost_multiplier", self.boost_multiplier),
            ("boost_duration", self.boost_duration),
            ("downforce", self.downforce),
            ("angular_retain", self.angular_retain),
            ("probe_height", self.probe_height),
            ("probe_distance", self.probe_distance),
            ("grounded_drag", self.grounded_drag),
            ("grounded_drag_multiplier", self.grounded_drag_multiplier),
            ("airborne_drag", self.airborne_drag),
            ("spinout_duration", self.spinout_duration),
            ("spinout_rate", self.spinout_rate),
            ("spinout_velocity_retain", self.spinout_velocity_retain),
        ];

        // every tunable is a finite, non-negative scale
        for (field, value) in numbers {
            if !value.is_finite() {
                return Err(KartError::tuning(field, format!("must be finite, got {value}")));
            }
            if value < 0.0 {
                return Err(KartError::tuning(field, format!("must not be negative, got {value}")));
            }
        }

        let positive = [
            ("top_speed", self.top_speed),
            ("steer_response", self.steer_response),
            ("drift_required_duration", self.drift_required_duration),
            ("probe_distance", self.probe_distance),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(KartError::tuning(field, format!("must be greater than zero, got {value}")));
            }
        }

        let unit = [
            ("turn_floor_factor", self.turn_floor_factor),
            ("drift_control_factor", self.drift_control_factor),
            ("grounded_grip_retain", self.grounded_grip_retain),
            ("drift_grip_retain", self.drift_grip_retain),
            ("drift_min_steer", self.drift_min_steer),
            ("angular_retain", self.angular_retain),
            ("spinout_velocity_retain", self.spinout_velocity_retain),
        ];
        for (field, value) in unit {
            if value > 1.0 {
                return Err(KartError::tuning(field, format!("must lie in [0, 1], got {value}")));
            }
        }

        if self.drift_turn_multiplier < 1.0 {
            return Err(KartError::tuning(
                "drift_turn_multiplier",
                format!("must be at least 1, got {}", self.drift_turn_multiplier),
            ));
        }
        if self.accel_gain_at_top_speed > self.accel_gain_at_rest {
            return Err(KartError::tuning(
                "accel_gain_at_top_speed",
                "falloff curve must not rise with speed",
            ));
        }
        if self.grounded_grip_retain + self.steer_slip > 1.0 {
            return Err(KartError::tuning("steer_slip", "grounded retain plus steer slip exceeds 1"));
        }

        Ok(())
    }

    /// Longitudinal gain for the current forward speed.
    pub fn accel_gain(&self, forward_speed: f32) -> f32 {
        let t = (forward_speed / self.top_speed).clamp(0.0, 1.0);
        self.accel_gain_at_rest + (self.accel_gain_at_top_speed - self.accel_gain_at_rest) * t
    }

    pub fn boost_acceleration(&self) -> f32 {
        self.acceleration * self.boost_multiplier
    }

    pub fn hop_enabled(&self) -> bool {
        self.drift_hop_duration > 0.0 && self.drift_hop_force > 0.0
    }
}

/// `KART_*` variables minus the server's own `KART_SERVER_*` namespace.
fn tuning_vars(vars: impl IntoIterator<Item = (String, String)>) -> Map<String, String> {
    vars.into_iter()
        .filter(|(key, _)| {
            let key = key.to_ascii_uppercase();
            key.starts_with("KART_") && !key.starts_with("KART_SERVER_")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn expect_field(result: Result<(), KartError>, expected: &str) {
        match result {
            Err(KartError::InvalidTuning { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected InvalidTuning({expected}), got {other:?}"),
        }
    }

    #[test]
    fn presets_are_valid() {
        CLASSIC.validate().unwrap();
        ARCADE.validate().unwrap();
        assert_eq!(KartTuning::default(), CLASSIC);
    }

    #[test]
    fn rejects_zero_top_speed() {
        let tuning = KartTuning { top_speed: 0.0, ..CLASSIC };
        expect_field(tuning.validate(), "top_speed");
    }

    #[test]
    fn rejects_negative_durations() {
        let tuning = KartTuning { boost_duration: -1.0, ..CLASSIC };
        expect_field(tuning.validate(), "boost_duration");

        let tuning = KartTuning { spinout_duration: -0.1, ..CLASSIC };
        expect_field(tuning.validate(), "spinout_duration");

        let tuning = KartTuning { drift_required_duration: 0.0, ..CLASSIC };
        expect_field(tuning.validate(), "drift_required_duration");
    }

    #[test]
    fn rejects_out_of_range_grip_and_nan() {
        let tuning = KartTuning { drift_grip_retain: 1.2, ..CLASSIC };
        expect_field(tuning.validate(), "drift_grip_retain");

        let tuning = KartTuning { acceleration: f32::NAN, ..CLASSIC };
        expect_field(tuning.validate(), "acceleration");

        let tuning = KartTuning { drift_turn_multiplier: 0.5, ..CLASSIC };
        expect_field(tuning.validate(), "drift_turn_multiplier");
    }

    #[test]
    fn rejects_rising_falloff_curve() {
        let tuning = KartTuning { accel_gain_at_top_speed: 2.0, ..CLASSIC };
        expect_field(tuning.validate(), "accel_gain_at_top_speed");
    }

    #[test]
    fn falloff_curve_is_monotonic() {
        let mut prev = f32::INFINITY;
        for i in 0..=40 {
            let gain = CLASSIC.accel_gain(i as f32 * 0.5);
            assert!(gain <= prev);
            prev = gain;
        }
        assert_eq!(CLASSIC.accel_gain(0.0), 1.5);
        assert_eq!(CLASSIC.accel_gain(CLASSIC.top_speed), 1.0);
        assert_eq!(CLASSIC.accel_gain(100.0), 1.0);
    }

    #[test]
    fn unknown_preset_is_an_error() {
        assert!(KartTuning::preset("Classic").is_ok());
        expect_field(KartTuning::preset("rally").map(|_| ()), "profile");
    }

    #[test]
    fn yaml_overrides_preset_fields() {
        let tuning = CLASSIC
            .with_yaml("top_speed: 26.5\ndrift_required_duration: 2.0\n")
            .unwrap();
        assert_eq!(tuning.top_speed, 26.5);
        assert_eq!(tuning.drift_required_duration, 2.0);
        assert_eq!(tuning.acceleration, CLASSIC.acceleration);
    }

    #[test]
    fn yaml_overrides_are_validated() {
        let result = CLASSIC.with_yaml("boost_duration: -3.0\n");
        assert!(matches!(result, Err(KartError::InvalidTuning { field: "boost_duration", .. })));
    }

    #[test]
    fn env_overrides_preset_but_skips_server_namespace() {
        let env = vars(&[
            ("KART_TOP_SPEED", "26"),
            ("KART_SERVER_BIND", "127.0.0.1:1"),
            ("HOME", "/root"),
        ]);
        let kept = tuning_vars(env.clone());
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key("KART_TOP_SPEED"));

        let tuning = KartTuning::load_with_env("arcade", None, env).unwrap();
        assert_eq!(tuning.top_speed, 26.0);
        assert_eq!(tuning.acceleration, ARCADE.acceleration);
    }

    #[test]
    fn env_overrides_are_validated() {
        let result = KartTuning::load_with_env("classic", None, vars(&[("KART_TOP_SPEED", "0")]));
        assert!(matches!(result, Err(KartError::InvalidTuning { field: "top_speed", .. })));
    }
}
