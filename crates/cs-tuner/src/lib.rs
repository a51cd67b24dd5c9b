//! PID gain search for cyclesim projects.
//!
//! [`BruteTuner`] evaluates every point of a `Kp x Ti x Td` grid with an
//! independent simulation and scores it from the project's performance
//! meter. [`RecurringBruteTuner`] repeats the search on ever narrower ranges.
//! Trials run on the rayon pool; the outcome does not depend on scheduling.

pub mod brute;
pub mod error;
pub mod grid;

pub use brute::{BruteTuner, RecurringBruteTuner, RecurringOutcome, RoundOutcome, Trial};
pub use error::{TunerError, TunerResult};
pub use grid::{Gains, SearchRanges, StepCounts, grid};
