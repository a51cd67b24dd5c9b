//! Error types for PID tuning.

use cs_metrics::MeterError;
use cs_sim::SimError;
use thiserror::Error;

pub type TunerResult<T> = Result<T, TunerError>;

#[derive(Error, Debug)]
pub enum TunerError {
    /// The project cannot be tuned as configured.
    #[error("Tuner configuration error: {what}")]
    Config { what: String },

    #[error("Measurement '{name}' is missing from the performance meter")]
    MissingMeasurement { name: String },

    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("Performance meter error: {0}")]
    Meter(#[from] MeterError),

    /// Every trial of a round failed.
    #[error("No trial completed out of {attempted}")]
    NoResult { attempted: usize },
}
