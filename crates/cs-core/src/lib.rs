//! cs-core: stable foundation for cyclesim.
//!
//! Contains:
//! - numeric (Real, checked division, sampling helpers)
//! - calculus (stateful integrator, differentiator and deadband operators)
//! - trace (append-only signal history)
//! - error (shared error types)

pub mod calculus;
pub mod error;
pub mod numeric;
pub mod trace;

// Re-exports: nice ergonomics for downstream crates
pub use calculus::{Deadband, Differentiator, Integrator};
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use trace::{Retention, Trace};
