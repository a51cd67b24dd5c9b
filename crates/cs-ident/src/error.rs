use thiserror::Error;

pub type FitResult<T> = Result<T, FitError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid data: {what}")]
    InvalidData { what: String },

    /// The data does not pin down the model (constant signals, unstable fit).
    #[error("Degenerate fit: {what}")]
    Degenerate { what: String },

    #[error("Least-squares solve failed: {what}")]
    Solve { what: String },
}
