//! First- and second-order transfer-function fitters.

use cs_core::Real;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::debug;

use crate::data::Dataset;
use crate::error::{FitError, FitResult};

const SVD_EPS: Real = 1e-12;

/// Solve `A x = b` in the least-squares sense.
fn least_squares(
    rows: usize,
    cols: usize,
    a: Vec<Real>,
    b: Vec<Real>,
) -> FitResult<DVector<Real>> {
    let a = DMatrix::from_row_slice(rows, cols, &a);
    let b = DVector::from_vec(b);
    let svd = a.svd(true, true);
    if svd.rank(SVD_EPS * svd.singular_values.max()) < cols {
        return Err(FitError::Degenerate {
            what: format!("regressor matrix is rank deficient ({cols} unknowns)"),
        });
    }
    svd.solve(&b, SVD_EPS).map_err(|e| FitError::Solve {
        what: e.to_string(),
    })
}

fn rms(residuals: impl Iterator<Item = Real>) -> Real {
    let (sum, n) = residuals.fold((0.0, 0usize), |(s, n), r| (s + r * r, n + 1));
    if n == 0 { 0.0 } else { (sum / n as Real).sqrt() }
}

/// `tau * y' + y = K * u`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FirstOrderFit {
    pub gain: Real,
    /// Time constant (seconds)
    pub tau: Real,
    /// RMS one-step prediction error
    pub residual_rms: Real,
}

impl FirstOrderFit {
    /// Response to `u` sampled every `dt`, starting from `y0`, with `u`
    /// held constant between samples.
    pub fn simulate(&self, u: &[Real], dt: Real, y0: Real) -> Vec<Real> {
        let a = (-dt / self.tau).exp();
        let mut y = Vec::with_capacity(u.len());
        let mut yk = y0;
        for &uk in u {
            y.push(yk);
            yk = a * yk + (1.0 - a) * self.gain * uk;
        }
        y
    }
}

/// Fits [`FirstOrderFit`] on the zero-order-hold ARX form
/// `y[k+1] = a*y[k] + b*u[k]`, with `a = exp(-dt/tau)` and `b = K*(1 - a)`.
#[derive(Debug, Clone, Default)]
pub struct FirstOrderFitter;

impl FirstOrderFitter {
    pub fn new() -> Self {
        Self
    }

    pub fn fit(&self, data: &Dataset) -> FitResult<FirstOrderFit> {
        data.require_rows(3)?;
        let dt = data.uniform_dt()?;
        let (u, y) = (data.u(), data.y());
        let n = data.len() - 1;

        let mut a = Vec::with_capacity(n * 2);
        let mut b = Vec::with_capacity(n);
        for k in 0..n {
            a.extend_from_slice(&[y[k], u[k]]);
            b.push(y[k + 1]);
        }
        let theta = least_squares(n, 2, a, b)?;
        let (pole, input) = (theta[0], theta[1]);
        if !(pole > 0.0 && pole < 1.0) {
            return Err(FitError::Degenerate {
                what: format!("discrete pole {pole} is not a stable first-order lag"),
            });
        }
        let tau = -dt / pole.ln();
        let gain = input / (1.0 - pole);
        let residual_rms = rms((0..n).map(|k| y[k + 1] - pole * y[k] - input * u[k]));
        debug!(gain, tau, residual_rms, "first-order fit");
        Ok(FirstOrderFit {
            gain,
            tau,
            residual_rms,
        })
    }
}

/// `y'' + 2*zeta*w*y' + w^2*y = K*w^2*u`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SecondOrderFit {
    pub gain: Real,
    pub damping: Real,
    /// Natural frequency (rad/s)
    pub natural_frequency: Real,
    /// RMS residual of the differential equation at the fitted points
    pub residual_rms: Real,
}

impl SecondOrderFit {
    /// Response to `u` sampled every `dt`, starting at rest at `y0`.
    ///
    /// Integrated with RK4, `u` held between samples.
    pub fn simulate(&self, u: &[Real], dt: Real, y0: Real) -> Vec<Real> {
        let w2 = self.natural_frequency * self.natural_frequency;
        let c = 2.0 * self.damping * self.natural_frequency;
        let k = self.gain;
        let f = |y: Real, v: Real, uk: Real| (v, k * w2 * uk - c * v - w2 * y);

        let mut out = Vec::with_capacity(u.len());
        let (mut y, mut v) = (y0, 0.0);
        for &uk in u {
            out.push(y);
            let (k1y, k1v) = f(y, v, uk);
            let (k2y, k2v) = f(y + 0.5 * dt * k1y, v + 0.5 * dt * k1v, uk);
            let (k3y, k3v) = f(y + 0.5 * dt * k2y, v + 0.5 * dt * k2v, uk);
            let (k4y, k4v) = f(y + dt * k3y, v + dt * k3v, uk);
            y += dt / 6.0 * (k1y + 2.0 * k2y + 2.0 * k3y + k4y);
            v += dt / 6.0 * (k1v + 2.0 * k2v + 2.0 * k3v + k4v);
        }
        out
    }
}

/// Fits [`SecondOrderFit`] by regressing central-difference estimates of
/// `y''` on `y'`, `y` and `u`.
#[derive(Debug, Clone, Default)]
pub struct SecondOrderFitter;

impl SecondOrderFitter {
    pub fn new() -> Self {
        Self
    }

    pub fn fit(&self, data: &Dataset) -> FitResult<SecondOrderFit> {
        data.require_rows(5)?;
        let (t, u, y) = (data.t(), data.u(), data.y());
        let n = data.len() - 2;

        let mut a = Vec::with_capacity(n * 3);
        let mut b = Vec::with_capacity(n);
        for k in 1..=n {
            let (h0, h1) = (t[k] - t[k - 1], t[k + 1] - t[k]);
            let d1 = (y[k + 1] - y[k - 1]) / (h0 + h1);
            let d2 = 2.0 * (h0 * y[k + 1] - (h0 + h1) * y[k] + h1 * y[k - 1])
                / (h0 * h1 * (h0 + h1));
            a.extend_from_slice(&[d1, y[k], u[k]]);
            b.push(d2);
        }
        let theta = least_squares(n, 3, a.clone(), b.clone())?;
        let (c_v, c_y, c_u) = (theta[0], theta[1], theta[2]);
        if !(c_y < 0.0) {
            return Err(FitError::Degenerate {
                what: format!("stiffness term {c_y} gives no real natural frequency"),
            });
        }
        let natural_frequency = (-c_y).sqrt();
        let damping = -c_v / (2.0 * natural_frequency);
        let gain = c_u / -c_y;
        let residual_rms = rms(
            a.chunks_exact(3)
                .zip(&b)
                .map(|(row, d2)| d2 - (c_v * row[0] + c_y * row[1] + c_u * row[2])),
        );
        debug!(gain, damping, natural_frequency, residual_rms, "second-order fit");
        Ok(SecondOrderFit {
            gain,
            damping,
            natural_frequency,
            residual_rms,
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn first_order_fit_inverts_simulation(gain in 0.5f64..5.0, tau in 0.05f64..2.0) {
            let truth = FirstOrderFit { gain, tau, residual_rms: 0.0 };
            let dt = 0.01;
            let u: Vec<Real> = (0..400).map(|k| if k < 5 { 0.0 } else { 1.0 }).collect();
            let y = truth.simulate(&u, dt, 0.0);
            let t = (0..u.len()).map(|k| k as Real * dt).collect();
            let fit = FirstOrderFitter::new()
                .fit(&Dataset::new(t, u, y).unwrap())
                .unwrap();
            prop_assert!(((fit.gain - gain) / gain).abs() < 1e-6);
            prop_assert!(((fit.tau - tau) / tau).abs() < 1e-6);
        }
    }
}
