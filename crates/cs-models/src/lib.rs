//! Simulated units for cyclesim.
//!
//! Every model consumes a fixed set of named scalar inputs once per cycle,
//! produces one primary output, and records each observable quantity in a
//! [`Trace`](cs_core::Trace) so collaborators can read the latest value or
//! the whole history.
//!
//! # Model kinds
//!
//! The set of kinds is closed ([`ModelKind`]): physical processes (RC, RL,
//! RL with a clamped resistor voltage, DC motor), a scripted
//! [`SignalGenerator`] and the PID family. Construction from a
//! configuration entry goes through [`build_model`], which decodes the
//! kind-specific parameter struct.

pub mod error;
pub mod model;
pub mod motor;
pub mod pid;
pub mod rc;
pub mod rl;
pub mod signal;

pub use error::{ModelError, ModelResult};
pub use model::{FieldId, Model, ModelInstance, ModelKind, build_model};
pub use motor::{DcMotor, DcMotorParams};
pub use pid::{DerivativeInput, OutputLimits, PidConfig, PidController, PidGains, PidParams};
pub use rc::{RcCircuit, RcParams};
pub use rl::{RlCircuit, RlParams};
pub use signal::{Event, SignalGenerator, SignalGeneratorParams};
