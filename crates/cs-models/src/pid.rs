//! PID controller family.
//!
//! One implementation covers the three configured behaviours:
//! - **PID**: unbounded output
//! - **PIDLimited**: output clamping only
//! - **PIDAntiWindup**: output clamping with back-calculation of the
//!   integral so it stays consistent with the clamped output
//!
//! The derivative action is passed through a [`Deadband`] before scaling; a
//! zero-width band (the default) leaves it untouched.

use cs_core::{
    CoreError, Deadband, Differentiator, Integrator, Real, Retention, Trace, checked_div,
    ensure_finite,
};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::{FieldId, Model, ModelKind};

/// Controller gains. May be retuned between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: Real,
    /// Integral time (seconds).
    pub ti: Real,
    /// Derivative time (seconds).
    pub td: Real,
}

/// Optional bounds on the manipulated variable. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputLimits {
    pub min: Option<Real>,
    pub max: Option<Real>,
}

impl OutputLimits {
    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    fn validate(&self) -> ModelResult<()> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min >= max {
                return Err(ModelError::InvalidParam {
                    what: format!("min_MV ({min}) must be less than max_MV ({max})"),
                });
            }
        }
        Ok(())
    }

    /// Clamp `mv`, reporting whether a bound was hit.
    pub fn apply(&self, mv: Real) -> (Real, bool) {
        if let Some(max) = self.max {
            if mv > max {
                return (max, true);
            }
        }
        if let Some(min) = self.min {
            if mv < min {
                return (min, true);
            }
        }
        (mv, false)
    }
}

/// Signal the derivative action differentiates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeInput {
    /// `SP - PV`
    #[default]
    Error,
    /// `PV`; avoids derivative kick on setpoint steps.
    ProcessVariable,
}

/// Behavioural configuration of a [`PidController`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidConfig {
    pub limits: OutputLimits,
    pub anti_windup: bool,
    pub deadband: Deadband,
    pub derivative_on: DerivativeInput,
    /// Initial integrator area.
    pub initial_integral: Real,
}

/// Parameters of the PID family as found in a model specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    #[serde(rename = "Kp")]
    pub kp: Real,
    #[serde(rename = "Ti")]
    pub ti: Real,
    #[serde(rename = "Td", default)]
    pub td: Real,
    /// Initial integrator area.
    #[serde(rename = "I0", default)]
    pub i0: Real,
    #[serde(rename = "min_MV", default)]
    pub min_mv: Option<Real>,
    #[serde(rename = "max_MV", default)]
    pub max_mv: Option<Real>,
    /// Deadband half-width applied to the derivative rate.
    #[serde(default)]
    pub deadband: Real,
    #[serde(default)]
    pub deadband_offset: Real,
    #[serde(rename = "differ_on_PV", default)]
    pub differ_on_pv: bool,
}

/// Discrete PID regulator.
///
/// Per cycle:
///
/// ```text
/// e  = SP - PV
/// PG = Kp * e
/// IG = ∫e dt * Kp / Ti             (trapezoidal)
/// DG = deadband(d/dt input) * Kp * Td
/// MV = PG + IG + DG + FWD          (then clamped)
/// ```
///
/// With anti-windup, a clamped cycle recomputes `IG = MV - PG - DG - FWD`
/// and rewrites the integrator to `IG * Ti / Kp`.
#[derive(Debug, Clone)]
pub struct PidController {
    kind: ModelKind,
    dt: Real,
    gains: PidGains,
    config: PidConfig,
    integrator: Integrator,
    differentiator: Differentiator,
    saturated: bool,
    sp: Trace,
    pv: Trace,
    fwd: Trace,
    error: Trace,
    p: Trace,
    i: Trace,
    d: Trace,
    mv: Trace,
}

impl PidController {
    /// Create a controller.
    ///
    /// # Errors
    ///
    /// `dt` must be positive, `Ti` non-zero, and limits ordered.
    pub fn new(
        kind: ModelKind,
        dt: Real,
        gains: PidGains,
        config: PidConfig,
        retention: Retention,
    ) -> ModelResult<Self> {
        if !kind.is_pid() {
            return Err(ModelError::InvalidParam {
                what: format!("{kind} is not a PID kind"),
            });
        }
        if dt == 0.0 {
            return Err(CoreError::DivisionByZero { what: "PID dt" }.into());
        }
        if !(dt > 0.0) {
            return Err(ModelError::InvalidParam {
                what: format!("dt must be positive, got {dt}"),
            });
        }
        if gains.ti == 0.0 {
            return Err(CoreError::DivisionByZero { what: "PID Ti" }.into());
        }
        config.limits.validate()?;

        let trace = |v| Trace::new(v, retention);
        Ok(Self {
            kind,
            dt,
            gains,
            config,
            integrator: Integrator::new(config.initial_integral),
            differentiator: Differentiator::new(),
            saturated: false,
            sp: trace(0.0),
            pv: trace(0.0),
            fwd: trace(0.0),
            error: trace(0.0),
            p: trace(0.0),
            i: trace(0.0),
            d: trace(0.0),
            mv: trace(0.0),
        })
    }

    /// Build from specification parameters; `kind` selects the preset.
    ///
    /// `PID` refuses output limits, the limited variants require at least one.
    pub fn from_params(
        kind: ModelKind,
        dt: Real,
        params: PidParams,
        retention: Retention,
    ) -> ModelResult<Self> {
        let limits = OutputLimits {
            min: params.min_mv,
            max: params.max_mv,
        };
        match kind {
            ModelKind::Pid if limits.is_bounded() => {
                return Err(ModelError::InvalidParam {
                    what: "PID takes no MV limits; use PIDLimited or PIDAntiWindup".to_string(),
                });
            }
            ModelKind::PidLimited | ModelKind::PidAntiWindup if !limits.is_bounded() => {
                return Err(ModelError::InvalidParam {
                    what: format!("{kind} requires min_MV and/or max_MV"),
                });
            }
            _ => {}
        }
        let config = PidConfig {
            limits,
            anti_windup: kind == ModelKind::PidAntiWindup,
            deadband: Deadband::new(params.deadband, params.deadband_offset)?,
            derivative_on: if params.differ_on_pv {
                DerivativeInput::ProcessVariable
            } else {
                DerivativeInput::Error
            },
            initial_integral: params.i0,
        };
        let gains = PidGains {
            kp: params.kp,
            ti: params.ti,
            td: params.td,
        };
        Self::new(kind, dt, gains, config, retention)
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Replace all three gains at once.
    pub fn set_gains(&mut self, gains: PidGains) -> ModelResult<()> {
        if gains.ti == 0.0 {
            return Err(CoreError::DivisionByZero { what: "PID Ti" }.into());
        }
        self.gains = gains;
        Ok(())
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    /// True if the last cycle hit an output limit.
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn mv(&self) -> &Trace {
        &self.mv
    }

    /// Compute the manipulated variable for one cycle.
    pub fn step(&mut self, sp: Real, pv: Real, fwd: Real) -> ModelResult<Real> {
        let PidGains { kp, ti, td } = self.gains;
        if ti == 0.0 {
            return Err(CoreError::DivisionByZero { what: "PID Ti" }.into());
        }

        let error = sp - pv;
        let pg = kp * error;

        let area = self.integrator.calculate(self.dt, error);
        let mut ig = checked_div(area * kp, ti, "PID Ti")?;

        let derivative_input = match self.config.derivative_on {
            DerivativeInput::Error => error,
            DerivativeInput::ProcessVariable => pv,
        };
        let rate = self.differentiator.calculate(self.dt, derivative_input)?;
        let dg = self.config.deadband.calculate(rate) * kp * td;

        let (mv, saturated) = self.config.limits.apply(pg + ig + dg + fwd);
        let mv = ensure_finite(mv, "PID MV")?;

        if saturated && self.config.anti_windup {
            ig = mv - pg - dg - fwd;
            let area = checked_div(ig * ti, kp, "PID Kp (anti-windup)")?;
            self.integrator.reset(area);
        }
        self.saturated = saturated;

        self.sp.push(sp);
        self.pv.push(pv);
        self.fwd.push(fwd);
        self.error.push(error);
        self.p.push(pg);
        self.i.push(ig);
        self.d.push(dg);
        self.mv.push(mv);
        Ok(mv)
    }
}

impl Model for PidController {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn calculate(&mut self, inputs: &[Real]) -> ModelResult<Real> {
        self.step(inputs[0], inputs[1], inputs[2])
    }

    fn reset(&mut self) {
        self.integrator.clear();
        self.differentiator.clear();
        self.saturated = false;
        for trace in [
            &mut self.sp,
            &mut self.pv,
            &mut self.fwd,
            &mut self.error,
            &mut self.p,
            &mut self.i,
            &mut self.d,
            &mut self.mv,
        ] {
            trace.reset();
        }
    }

    fn trace(&self, field: FieldId) -> Option<&Trace> {
        match field.index() {
            0 => Some(&self.sp),
            1 => Some(&self.pv),
            2 => Some(&self.fwd),
            3 => Some(&self.error),
            4 => Some(&self.p),
            5 => Some(&self.i),
            6 => Some(&self.d),
            7 => Some(&self.mv),
            _ => None,
        }
    }

    fn input_default(&self, input: usize) -> Option<Real> {
        // FWD is optional
        (input == 2).then_some(0.0)
    }

    fn set_param(&mut self, name: &str, value: Real) -> ModelResult<()> {
        let mut gains = self.gains;
        match name {
            "Kp" => gains.kp = value,
            "Ti" => gains.ti = value,
            "Td" => gains.td = value,
            "min_MV" | "max_MV" if self.config.limits.is_bounded() => {
                let mut limits = self.config.limits;
                if name == "min_MV" {
                    limits.min = Some(value);
                } else {
                    limits.max = Some(value);
                }
                limits.validate()?;
                self.config.limits = limits;
                return Ok(());
            }
            "deadband" => {
                self.config.deadband = Deadband::new(value, self.config.deadband.offset)?;
                return Ok(());
            }
            _ => {
                return Err(ModelError::UnknownParam {
                    kind: self.kind,
                    name: name.to_string(),
                });
            }
        }
        self.set_gains(gains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: Real = 0.01;

    fn pid(kind: ModelKind, kp: Real, ti: Real, td: Real, limits: OutputLimits) -> PidController {
        let config = PidConfig {
            limits,
            anti_windup: kind == ModelKind::PidAntiWindup,
            ..PidConfig::default()
        };
        PidController::new(kind, DT, PidGains { kp, ti, td }, config, Retention::Full).unwrap()
    }

    fn bounded(min: Real, max: Real) -> OutputLimits {
        OutputLimits {
            min: Some(min),
            max: Some(max),
        }
    }

    #[test]
    fn first_cycle_terms() {
        let mut c = pid(ModelKind::Pid, 2.0, 0.5, 0.1, OutputLimits::default());
        let mv = c.step(1.0, 0.0, 0.0).unwrap();
        // PG = 2, IG = (0.01 * 1) * 2 / 0.5 = 0.04, DG = 0 on first sample
        assert!((c.p.last() - 2.0).abs() < 1e-12);
        assert!((c.i.last() - 0.04).abs() < 1e-12);
        assert_eq!(c.d.last(), 0.0);
        assert!((mv - 2.04).abs() < 1e-12);
    }

    #[test]
    fn derivative_on_error_reacts_to_setpoint_change() {
        let mut c = pid(ModelKind::Pid, 1.0, 1.0, 0.5, OutputLimits::default());
        c.step(0.0, 0.0, 0.0).unwrap();
        c.step(1.0, 0.0, 0.0).unwrap();
        // rate = 1 / 0.01 = 100, DG = 100 * 1 * 0.5
        assert!((c.d.last() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn derivative_on_pv_ignores_setpoint_change() {
        let mut c = pid(ModelKind::Pid, 1.0, 1.0, 0.5, OutputLimits::default());
        c.config.derivative_on = DerivativeInput::ProcessVariable;
        c.step(0.0, 0.0, 0.0).unwrap();
        c.step(1.0, 0.0, 0.0).unwrap();
        assert_eq!(c.d.last(), 0.0);
        c.step(1.0, 0.1, 0.0).unwrap();
        // rate = 0.1 / 0.01 = 10, DG = 10 * 1 * 0.5
        assert!((c.d.last() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn deadband_offset_applies_to_pv_rate() {
        let mut c = pid(ModelKind::Pid, 1.0, 1.0, 1.0, OutputLimits::default());
        c.config.derivative_on = DerivativeInput::ProcessVariable;
        c.config.deadband = Deadband::new(1.0, 5.0).unwrap();
        c.step(0.0, 0.0, 0.0).unwrap();
        c.step(0.0, 0.05, 0.0).unwrap(); // rate 5, inside [4, 6]
        assert!((c.d.last() - 5.0).abs() < 1e-9);
        c.step(0.0, 0.15, 0.0).unwrap(); // rate 10, shrunk to 9
        assert!((c.d.last() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn deadband_suppresses_small_rates() {
        let mut c = pid(ModelKind::Pid, 1.0, 1.0, 1.0, OutputLimits::default());
        c.config.deadband = Deadband::new(5.0, 0.0).unwrap();
        c.step(0.0, 0.0, 0.0).unwrap();
        c.step(0.01, 0.0, 0.0).unwrap(); // rate 1, inside the band
        assert_eq!(c.d.last(), 0.0);
        c.step(0.11, 0.0, 0.0).unwrap(); // rate 10, shrunk to 5
        assert!((c.d.last() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn limited_output_is_clamped_without_back_calculation() {
        let mut c = pid(ModelKind::PidLimited, 10.0, 1.0, 0.0, bounded(-1.0, 1.0));
        for _ in 0..50 {
            assert_eq!(c.step(5.0, 0.0, 0.0).unwrap(), 1.0);
        }
        assert!(c.is_saturated());
        // integral keeps growing, so the term sum no longer matches MV
        assert!(c.i.last() > 1.0);
    }

    #[test]
    fn anti_windup_keeps_terms_consistent_with_output() {
        let mut c = pid(ModelKind::PidAntiWindup, 10.0, 1.0, 0.0, bounded(-1.0, 1.0));
        for _ in 0..50 {
            let mv = c.step(5.0, 0.0, 0.0).unwrap();
            assert_eq!(mv, 1.0);
            let sum = c.p.last() + c.i.last() + c.d.last() + c.fwd.last();
            assert!((sum - mv).abs() < 1e-9);
        }
    }

    #[test]
    fn anti_windup_overshoot_is_one_cycle_of_integration() {
        let (kp, ti) = (10.0, 1.0);
        let mut c = pid(ModelKind::PidAntiWindup, kp, ti, 0.0, bounded(-1.0, 1.0));
        let error = 5.0;
        c.step(error, 0.0, 0.0).unwrap();
        for _ in 0..100 {
            let ig_before = c.i.last();
            c.step(error, 0.0, 0.0).unwrap();
            // unclamped MV of this cycle = PG + IG_prev + one trapezoid
            let unclamped = kp * error + ig_before + DT * error * kp / ti;
            assert!(unclamped - 1.0 <= DT * error * kp / ti + 1e-9);
        }
    }

    #[test]
    fn anti_windup_recovers_faster_than_plain_clamp() {
        let limits = bounded(-1.0, 1.0);
        let mut plain = pid(ModelKind::PidLimited, 0.5, 0.2, 0.0, limits);
        let mut aw = pid(ModelKind::PidAntiWindup, 0.5, 0.2, 0.0, limits);
        for _ in 0..500 {
            plain.step(10.0, 0.0, 0.0).unwrap();
            aw.step(10.0, 0.0, 0.0).unwrap();
        }
        // setpoint reverses; count cycles until each controller leaves +max
        let leave = |c: &mut PidController| {
            (0..5_000)
                .position(|_| c.step(-10.0, 0.0, 0.0).unwrap() < 1.0)
                .unwrap_or(usize::MAX)
        };
        assert!(leave(&mut aw) < leave(&mut plain));
    }

    #[test]
    fn zero_ti_is_arithmetic_error() {
        let mut c = pid(ModelKind::Pid, 1.0, 1.0, 0.0, OutputLimits::default());
        assert!(c.set_param("Ti", 0.0).unwrap_err().is_arithmetic());
        c.gains.ti = 0.0;
        assert!(c.step(1.0, 0.0, 0.0).unwrap_err().is_arithmetic());
    }

    #[test]
    fn zero_dt_is_arithmetic_error() {
        let err = PidController::new(
            ModelKind::Pid,
            0.0,
            PidGains {
                kp: 1.0,
                ti: 1.0,
                td: 0.0,
            },
            PidConfig::default(),
            Retention::Full,
        )
        .unwrap_err();
        assert!(err.is_arithmetic());
    }

    #[test]
    fn preset_limit_rules() {
        let base = PidParams {
            kp: 1.0,
            ti: 1.0,
            td: 0.0,
            i0: 0.0,
            min_mv: None,
            max_mv: Some(5.0),
            deadband: 0.0,
            deadband_offset: 0.0,
            differ_on_pv: false,
        };
        assert!(PidController::from_params(ModelKind::Pid, DT, base.clone(), Retention::Full).is_err());
        let aw = PidController::from_params(ModelKind::PidAntiWindup, DT, base.clone(), Retention::Full)
            .unwrap();
        assert!(aw.config().anti_windup);
        let unbounded = PidParams {
            max_mv: None,
            ..base
        };
        assert!(
            PidController::from_params(ModelKind::PidLimited, DT, unbounded, Retention::Full).is_err()
        );
    }

    #[test]
    fn reset_restores_state_but_keeps_gains() {
        let mut c = pid(ModelKind::PidAntiWindup, 3.0, 0.5, 0.1, bounded(-2.0, 2.0));
        let fresh = c.clone();
        c.set_param("Kp", 4.0).unwrap();
        for k in 0..30 {
            c.step(1.0, k as Real * 0.01, 0.0).unwrap();
        }
        c.reset();
        c.reset();
        assert_eq!(c.gains().kp, 4.0);
        assert_eq!(c.integrator, fresh.integrator);
        assert_eq!(c.differentiator, fresh.differentiator);
        for id in 0..ModelKind::Pid.fields().len() {
            assert_eq!(c.trace(FieldId(id)), fresh.trace(FieldId(id)));
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn unbounded_mv_is_sum_of_terms(
            kp in 0.1_f64..10.0,
            ti in 0.05_f64..10.0,
            td in 0.0_f64..1.0,
            inputs in prop::collection::vec((-10.0_f64..10.0, -10.0_f64..10.0, -1.0_f64..1.0), 1..50),
        ) {
            let mut c = PidController::new(
                ModelKind::Pid,
                0.01,
                PidGains { kp, ti, td },
                PidConfig::default(),
                Retention::Window,
            ).unwrap();
            for (sp, pv, fwd) in inputs {
                let mv = c.step(sp, pv, fwd).unwrap();
                let sum = c.p.last() + c.i.last() + c.d.last() + fwd;
                prop_assert_eq!(mv, sum);
            }
        }
    }
}
