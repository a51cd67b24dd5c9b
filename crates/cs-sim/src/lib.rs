//! Discrete-time simulation engine for cyclesim.
//!
//! Provides:
//! - Model registry built from [`ModelSpec`](cs_project::ModelSpec)s, with
//!   unknown or disabled specs skipped
//! - Execution graph ordered by `order`, newest-first among ties
//! - Typed input wiring checked before the first cycle
//! - Cycle loop with observers and a cooperative stop handle

pub mod error;
pub mod graph;
pub mod sim;

pub use cs_project::TiePolicy;
pub use error::{SimError, SimResult};
pub use graph::{Binding, ExecutionGraph, GraphEntry, InputSource, SimField};
pub use sim::{CycleObserver, RunSummary, SimOptions, Simulator, StopHandle};
