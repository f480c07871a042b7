use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::KartError;

/// Server-level settings. Defaults, then `kart-server.yaml`, then `KART_SERVER_*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub tick_rate: u32,                // Hz
    pub profile: String,               // tuning preset: classic | arcade
    pub tuning_file: Option<String>,   // YAML overrides on top of the preset
    pub kill_plane: f32,               // karts below this y respawn
    pub item_cooldown: f32,            // s an item box stays empty
    pub item_box_radius: f32,
    pub item_boxes: Vec<[f32; 3]>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9001".into(),
            tick_rate: 60,
            profile: "classic".into(),
            tuning_file: None,
            kill_plane: -20.0,
            item_cooldown: 3.0,
            item_box_radius: 1.5,
            item_boxes: vec![[0.0, 0.5, 30.0], [6.0, 0.5, 30.0], [-6.0, 0.5, 30.0]],
        }
    }
}

impl ServerSettings {
    pub fn load(file: &str) -> Result<ServerSettings, KartError> {
        let settings: ServerSettings = Config::builder()
            .add_source(Config::try_from(&ServerSettings::default())?)
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("KART_SERVER").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), KartError> {
        if self.tick_rate == 0 {
            return Err(KartError::tuning("tick_rate", "must be at least 1 Hz"));
        }
        if !self.kill_plane.is_finite() {
            return Err(KartError::tuning("kill_plane", "must be finite"));
        }
        if !(self.item_cooldown.is_finite() && self.item_cooldown >= 0.0) {
            return Err(KartError::tuning("item_cooldown", format!("must not be negative, got {}", self.item_cooldown)));
        }
        if !(self.item_box_radius.is_finite() && self.item_box_radius > 0.0) {
            return Err(KartError::tuning("item_box_radius", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = ServerSettings::default();
        settings.validate().unwrap();
        assert!((settings.tick_dt() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = ServerSettings::load("does-not-exist/kart-server").unwrap();
        assert_eq!(settings.tick_rate, 60);
        assert_eq!(settings.profile, "classic");
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let settings = ServerSettings { tick_rate: 0, ..ServerSettings::default() };
        assert!(matches!(settings.validate(), Err(KartError::InvalidTuning { field: "tick_rate", .. })));
    }
}
