//! Error types for model construction and stepping.

use cs_core::CoreError;
use thiserror::Error;

use crate::model::ModelKind;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Division by zero or a non-finite result inside a model computation.
    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] CoreError),

    /// The class name does not match any known model kind.
    #[error("Unknown model class '{class}'")]
    UnknownKind { class: String },

    /// Parameters could not be decoded for the given kind.
    #[error("Malformed parameters for {kind}: {source}")]
    Params {
        kind: ModelKind,
        #[source]
        source: serde_json::Error,
    },

    /// A parameter value is outside its valid range.
    #[error("Invalid parameter: {what}")]
    InvalidParam { what: String },

    /// `set_param` was called with a name the kind does not expose.
    #[error("{kind} has no parameter '{name}'")]
    UnknownParam { kind: ModelKind, name: String },

    /// An input value cannot be interpreted.
    #[error("Invalid input: {what}")]
    InvalidInput { what: String },

    /// Wrong number of input values handed to `calculate`.
    #[error("{kind} expects {expected} inputs, got {got}")]
    InputArity {
        kind: ModelKind,
        expected: usize,
        got: usize,
    },
}

impl ModelError {
    /// True for errors produced by the arithmetic guards.
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, ModelError::Arithmetic(_))
    }
}
