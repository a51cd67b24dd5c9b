//! Resistor-inductor circuit, with an optional resistor-voltage ceiling.

use cs_core::{Real, Retention, Trace, checked_div, ensure_finite};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::{FieldId, Model, ModelKind};

/// Construction parameters for [`RlCircuit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlParams {
    /// Resistance (ohm)
    pub resistance: Real,
    /// Inductance (henry)
    pub inductance: Real,
    /// Initial current (ampere)
    #[serde(default)]
    pub current: Real,
    /// Ceiling on the resistor voltage (volt). Enables the clamped variant.
    #[serde(default, rename = "vr_max", alias = "Vr_max")]
    pub vr_max: Option<Real>,
}

/// Series RL circuit driven by an input voltage.
///
/// Forward-Euler step on `dI/dt = (Vin - I*R) / L`, with `Vr` taken from the
/// current at the start of the step.
///
/// With a ceiling configured, a virtual series resistance switches in
/// whenever the next current would push the resistor voltage above the
/// ceiling. The current is held at `vr_max / R` and the surplus voltage is
/// reported on the `Vd` (drop) and `Rd` (resistance) channels, keeping
/// `Vin = Vr + Vl + Vd`.
#[derive(Debug, Clone)]
pub struct RlCircuit {
    dt: Real,
    r: Real,
    l: Real,
    vr_max: Option<Real>,
    vin: Trace,
    vr: Trace,
    vl: Trace,
    i: Trace,
    vd: Trace,
    rd: Trace,
}

impl RlCircuit {
    pub fn new(dt: Real, params: RlParams, retention: Retention) -> ModelResult<Self> {
        if !(dt > 0.0) {
            return Err(ModelError::InvalidParam {
                what: format!("dt must be positive, got {dt}"),
            });
        }
        let RlParams {
            resistance,
            inductance,
            current,
            vr_max,
        } = params;
        checked_div(1.0, inductance, "RL inductance")?;
        if let Some(ceiling) = vr_max {
            validate_ceiling(ceiling, resistance)?;
            if (current * resistance).abs() > ceiling {
                return Err(ModelError::InvalidParam {
                    what: format!(
                        "initial resistor voltage {} exceeds vr_max {ceiling}",
                        current * resistance
                    ),
                });
            }
        }
        let vr0 = current * resistance;
        Ok(Self {
            dt,
            r: resistance,
            l: inductance,
            vr_max,
            vin: Trace::new(0.0, retention),
            vr: Trace::new(vr0, retention),
            vl: Trace::new(-vr0, retention),
            i: Trace::new(current, retention),
            vd: Trace::new(0.0, retention),
            rd: Trace::new(0.0, retention),
        })
    }

    pub fn is_clamped(&self) -> bool {
        self.vr_max.is_some()
    }

    /// Time constant `L / R` (seconds).
    pub fn tau(&self) -> ModelResult<Real> {
        Ok(checked_div(self.l, self.r, "RL resistance")?)
    }

    /// Advance one cycle; returns the new current.
    pub fn step(&mut self, vin: Real) -> ModelResult<Real> {
        let i = self.i.last();
        let vr = i * self.r;
        let vl_free = vin - vr;
        let i_free = i + self.dt * checked_div(vl_free, self.l, "RL inductance")?;

        let (i_next, vl, vd, rd) = match self.vr_max {
            Some(ceiling) if (i_free * self.r).abs() > ceiling => {
                let i_cap = i_free.signum() * checked_div(ceiling, self.r, "RL resistance")?;
                let vl = self.l * (i_cap - i) / self.dt;
                let vd = vin - vr - vl;
                let rd = checked_div(vd, i_cap, "RL clamped current")?;
                (i_cap, vl, vd, rd)
            }
            _ => (i_free, vl_free, 0.0, 0.0),
        };
        let i_next = ensure_finite(i_next, "RL current")?;

        self.vin.push(vin);
        self.vr.push(vr);
        self.vl.push(vl);
        self.i.push(i_next);
        self.vd.push(vd);
        self.rd.push(rd);
        Ok(i_next)
    }
}

fn validate_ceiling(ceiling: Real, resistance: Real) -> ModelResult<()> {
    if !(ceiling > 0.0) {
        return Err(ModelError::InvalidParam {
            what: format!("vr_max must be positive, got {ceiling}"),
        });
    }
    checked_div(ceiling, resistance, "RL resistance")?;
    Ok(())
}

impl Model for RlCircuit {
    fn kind(&self) -> ModelKind {
        if self.is_clamped() {
            ModelKind::RlClamped
        } else {
            ModelKind::Rl
        }
    }

    fn calculate(&mut self, inputs: &[Real]) -> ModelResult<Real> {
        self.step(inputs[0])
    }

    fn reset(&mut self) {
        for trace in [
            &mut self.vin,
            &mut self.vr,
            &mut self.vl,
            &mut self.i,
            &mut self.vd,
            &mut self.rd,
        ] {
            trace.reset();
        }
    }

    fn trace(&self, field: FieldId) -> Option<&Trace> {
        match field.index() {
            0 => Some(&self.vin),
            1 => Some(&self.vr),
            2 => Some(&self.vl),
            3 => Some(&self.i),
            4 => Some(&self.vd),
            5 => Some(&self.rd),
            _ => None,
        }
    }

    fn input_default(&self, _input: usize) -> Option<Real> {
        None
    }

    fn set_param(&mut self, name: &str, value: Real) -> ModelResult<()> {
        match name {
            "R" | "resistance" => {
                if let Some(ceiling) = self.vr_max {
                    validate_ceiling(ceiling, value)?;
                }
                self.r = value;
            }
            "L" | "inductance" => {
                checked_div(1.0, value, "RL inductance")?;
                self.l = value;
            }
            "vr_max" if self.is_clamped() => {
                validate_ceiling(value, self.r)?;
                self.vr_max = Some(value);
            }
            _ => {
                return Err(ModelError::UnknownParam {
                    kind: self.kind(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}
