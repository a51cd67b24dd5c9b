//! Append-only signal history.

use crate::numeric::Real;

/// How much history a [`Trace`] keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Retention {
    /// Every value is kept (plotting, export).
    #[default]
    Full,
    /// Only the initial element and the two most recent values.
    Window,
}

/// One value per cycle, starting with the value at construction.
///
/// A trace is never empty, so [`Trace::last`] is always defined and
/// [`Trace::previous`] falls back to the latest value when only the initial
/// element exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    initial: Real,
    values: Vec<Real>,
    pushed: usize,
    retention: Retention,
}

impl Trace {
    pub fn new(initial: Real, retention: Retention) -> Self {
        Self {
            initial,
            values: vec![initial],
            pushed: 0,
            retention,
        }
    }

    pub fn push(&mut self, value: Real) {
        if self.retention == Retention::Window && self.values.len() == 3 {
            self.values.remove(1);
        }
        self.values.push(value);
        self.pushed += 1;
    }

    /// Most recent value.
    pub fn last(&self) -> Real {
        // values always holds at least the initial element
        self.values[self.values.len() - 1]
    }

    /// Value before the most recent one.
    pub fn previous(&self) -> Real {
        let n = self.values.len();
        if n >= 2 { self.values[n - 2] } else { self.values[0] }
    }

    pub fn initial(&self) -> Real {
        self.initial
    }

    /// Retained values, oldest first.
    pub fn values(&self) -> &[Real] {
        &self.values
    }

    /// Number of values appended since construction or the last reset.
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Truncate back to the initial element.
    pub fn reset(&mut self) {
        self.values.truncate(1);
        self.values[0] = self.initial;
        self.pushed = 0;
    }

    /// Replace the initial element and reset.
    pub fn reinitialize(&mut self, initial: Real) {
        self.initial = initial;
        self.reset();
    }
}
