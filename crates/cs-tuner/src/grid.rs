//! Search space: gain ranges, per-axis step counts and the grid they span.

use cs_core::{Real, linspace};
use cs_project::TunerDef;
use serde::Serialize;

/// One point of the search space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gains {
    pub kp: Real,
    pub ti: Real,
    pub td: Real,
}

/// Closed `[low, high]` interval per gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchRanges {
    pub p: [Real; 2],
    pub i: [Real; 2],
    pub d: [Real; 2],
}

impl SearchRanges {
    pub fn from_def(def: &TunerDef) -> Self {
        Self {
            p: def.p_range,
            i: def.i_range,
            d: def.d_range,
        }
    }

    /// Narrow every range to `1/divider` of its width, centred on `center`.
    ///
    /// Time constants cannot go negative, so the `i` and `d` ranges are
    /// clipped at zero.
    pub fn zoom(&self, center: Gains, divider: Real) -> Self {
        let shrink = |r: [Real; 2], c: Real| {
            let half = (r[1] - r[0]) / divider / 2.0;
            [c - half, c + half]
        };
        let clip = |r: [Real; 2]| [r[0].max(0.0), r[1].max(0.0)];
        Self {
            p: shrink(self.p, center.kp),
            i: clip(shrink(self.i, center.ti)),
            d: clip(shrink(self.d, center.td)),
        }
    }
}

/// Number of grid points per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    pub p: usize,
    pub i: usize,
    pub d: usize,
}

impl StepCounts {
    /// Per-axis settings win, then `steps`. Axes still unset share what is
    /// left of `max_combinations` evenly, with at least one point each.
    pub fn resolve(def: &TunerDef) -> Self {
        let positive = |s: Option<usize>| s.filter(|&n| n > 0);
        let mut axes = [
            positive(def.p_steps),
            positive(def.i_steps),
            positive(def.d_steps),
        ];

        if let Some(steps) = positive(def.steps) {
            for axis in &mut axes {
                axis.get_or_insert(steps);
            }
        }

        let fixed: usize = axes.iter().flatten().product();
        let mut budget = (def.max_combinations / fixed.max(1)).max(1) as Real;
        let mut unset = axes.iter().filter(|a| a.is_none()).count();
        for axis in &mut axes {
            if axis.is_none() {
                // small epsilon so exact powers (1000 -> 10 x 10 x 10) are not rounded down
                let n = (budget.powf(1.0 / unset as Real) + 1e-9).floor().max(1.0);
                *axis = Some(n as usize);
                budget /= n;
                unset -= 1;
            }
        }

        let [p, i, d] = axes.map(|a| a.unwrap_or(1));
        Self { p, i, d }
    }

    pub fn combinations(&self) -> usize {
        self.p * self.i * self.d
    }
}

/// Every `(Kp, Ti, Td)` combination, `Kp` outermost.
pub fn grid(ranges: &SearchRanges, steps: &StepCounts) -> Vec<Gains> {
    let ps = linspace(ranges.p[0], ranges.p[1], steps.p);
    let is = linspace(ranges.i[0], ranges.i[1], steps.i);
    let ds = linspace(ranges.d[0], ranges.d[1], steps.d);

    let mut points = Vec::with_capacity(steps.combinations());
    for &kp in &ps {
        for &ti in &is {
            for &td in &ds {
                points.push(Gains { kp, ti, td });
            }
        }
    }
    points
}
