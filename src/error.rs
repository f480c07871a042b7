use thiserror::Error;

#[derive(Error, Debug)]
pub enum KartError {
    #[error("invalid tuning `{field}`: {reason}")]
    InvalidTuning { field: &'static str, reason: String },

    #[error("tick delta must be positive and finite, got {0}")]
    InvalidTimestep(f32),

    #[error("non-finite {quantity} on kart body: {value:?}")]
    NonFinite { quantity: &'static str, value: [f32; 4] },

    #[error("no kart registered for id {0}")]
    UnknownKart(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KartError {
    pub(crate) fn tuning(field: &'static str, reason: impl Into<String>) -> Self {
        KartError::InvalidTuning {
            field,
            reason: reason.into(),
        }
    }

    /// Faults that corrupt the simulated body rather than the setup.
    pub fn is_state_fault(&self) -> bool {
        matches!(self, KartError::NonFinite { .. })
    }
}
