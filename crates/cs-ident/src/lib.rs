//! Transfer-function identification from recorded step data.
//!
//! ```text
//! first order:   tau * y' + y = K * u
//! second order:  y'' + 2*zeta*w*y' + w^2*y = K*w^2*u
//! ```

pub mod data;
pub mod error;
pub mod fit;

pub use data::{Dataset, parse_csv};
pub use error::{FitError, FitResult};
pub use fit::{FirstOrderFit, FirstOrderFitter, SecondOrderFit, SecondOrderFitter};
