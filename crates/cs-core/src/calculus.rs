//! Stateful single-purpose numeric operators.
//!
//! Each operator keeps just enough state for one-step lookback, so they are
//! cheap to embed inside models that run once per simulation cycle.

use crate::error::{CoreError, CoreResult};
use crate::numeric::Real;

/// Trapezoidal running integrator.
///
/// The first sample is paired with itself so the integral does not jump on
/// the first call.
#[derive(Debug, Clone, PartialEq)]
pub struct Integrator {
    initial_area: Real,
    area: Real,
    previous: Option<Real>,
}

impl Integrator {
    /// Create an integrator whose accumulator starts at `initial_area`.
    pub fn new(initial_area: Real) -> Self {
        Self {
            initial_area,
            area: initial_area,
            previous: None,
        }
    }

    /// Accumulate one trapezoid of width `dt` and return the running area.
    pub fn calculate(&mut self, dt: Real, y: Real) -> Real {
        let previous = self.previous.unwrap_or(y);
        self.area += dt * (previous + y) / 2.0;
        self.previous = Some(y);
        self.area
    }

    /// Overwrite the accumulator, keeping the previous sample.
    ///
    /// Used for anti-windup back-calculation.
    pub fn reset(&mut self, area: Real) {
        self.area = area;
    }

    /// Restore the state observed right after construction.
    pub fn clear(&mut self) {
        self.area = self.initial_area;
        self.previous = None;
    }

    pub fn area(&self) -> Real {
        self.area
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Backward-difference derivative estimator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Differentiator {
    previous: Option<Real>,
}

impl Differentiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `(y - previous) / dt`; the first call yields zero.
    ///
    /// # Errors
    ///
    /// `CoreError::DivisionByZero` when `dt == 0`.
    pub fn calculate(&mut self, dt: Real, y: Real) -> CoreResult<Real> {
        if dt == 0.0 {
            return Err(CoreError::DivisionByZero {
                what: "differentiator dt",
            });
        }
        let previous = self.previous.unwrap_or(y);
        self.previous = Some(y);
        Ok((y - previous) / dt)
    }

    pub fn clear(&mut self) {
        self.previous = None;
    }
}

/// Shrinkage deadband around an offset.
///
/// Values inside `offset ± width` collapse to `offset`; values outside are
/// moved towards the offset by `width`. A zero width is the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deadband {
    pub width: Real,
    pub offset: Real,
}

impl Deadband {
    pub fn new(width: Real, offset: Real) -> CoreResult<Self> {
        if !(width >= 0.0) {
            return Err(CoreError::InvalidArg {
                what: "deadband width must be non-negative",
            });
        }
        Ok(Self { width, offset })
    }

    pub fn calculate(&self, value: Real) -> Real {
        if value > self.offset + self.width {
            value - self.width
        } else if value < self.offset - self.width {
            value + self.width
        } else {
            self.offset
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrator_first_sample_is_rectangle() {
        let mut int = Integrator::default();
        assert_eq!(int.calculate(0.5, 2.0), 1.0);
        // trapezoid between 2 and 4
        assert_eq!(int.calculate(0.5, 4.0), 2.5);
    }

    #[test]
    fn integrator_reset_keeps_previous_sample() {
        let mut int = Integrator::new(1.0);
        int.calculate(1.0, 2.0);
        int.reset(10.0);
        // (2 + 2) / 2 on top of the overwritten area
        assert_eq!(int.calculate(1.0, 2.0), 12.0);
    }

    #[test]
    fn integrator_clear_restores_initial_area() {
        let mut int = Integrator::new(3.0);
        int.calculate(1.0, 5.0);
        int.clear();
        assert_eq!(int, Integrator::new(3.0));
    }

    #[test]
    fn differentiator_backward_difference() {
        let mut d = Differentiator::new();
        assert_eq!(d.calculate(0.1, 5.0).unwrap(), 0.0);
        assert!((d.calculate(0.1, 6.0).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn differentiator_zero_dt_fails() {
        let mut d = Differentiator::new();
        assert!(matches!(
            d.calculate(0.0, 1.0),
            Err(CoreError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn deadband_shrinks_and_clips() {
        let db = Deadband::new(1.0, 0.0).unwrap();
        assert_eq!(db.calculate(3.0), 2.0);
        assert_eq!(db.calculate(-3.0), -2.0);
        assert_eq!(db.calculate(0.5), 0.0);

        let shifted = Deadband::new(0.5, 10.0).unwrap();
        assert_eq!(shifted.calculate(10.4), 10.0);
        assert_eq!(shifted.calculate(11.0), 10.5);
    }

    #[test]
    fn deadband_rejects_negative_width() {
        assert!(Deadband::new(-1.0, 0.0).is_err());
    }
}
