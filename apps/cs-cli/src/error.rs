use std::path::PathBuf;

pub type CliResult<T> = Result<T, CliError>;

/// Everything a command can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Project error: {0}")]
    Project(#[from] cs_project::ProjectError),

    #[error("Simulation error: {0}")]
    Sim(#[from] cs_sim::SimError),

    #[error("Performance meter error: {0}")]
    Meter(#[from] cs_metrics::MeterError),

    #[error("Tuner error: {0}")]
    Tuner(#[from] cs_tuner::TunerError),

    #[error("Fit error: {0}")]
    Fit(#[from] cs_ident::FitError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
