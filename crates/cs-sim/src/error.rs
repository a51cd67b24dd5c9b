//! Error types for simulation operations.

use cs_models::ModelError;
use thiserror::Error;

/// Errors raised while registering, wiring or stepping models.
#[derive(Error, Debug)]
pub enum SimError {
    /// A model specification could not be registered. Recoverable:
    /// [`Simulator::add_model`](crate::Simulator::add_model) logs and skips it.
    #[error("Configuration error for model '{name}': {what}")]
    Config { name: String, what: String },

    /// An input references something that does not exist.
    #[error("Wiring error: {what}")]
    Wiring { what: String },

    /// A model failed while stepping or being retuned.
    #[error("Model '{name}' failed: {source}")]
    Model {
        name: String,
        #[source]
        source: ModelError,
    },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Raised by a [`CycleObserver`](crate::CycleObserver).
    #[error("Observer error: {what}")]
    Observer { what: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn wiring(what: impl Into<String>) -> Self {
        SimError::Wiring { what: what.into() }
    }

    /// True if the underlying cause is an arithmetic guard.
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, SimError::Model { source, .. } if source.is_arithmetic())
    }
}
