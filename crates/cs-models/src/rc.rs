//! Resistor-capacitor circuit.

use cs_core::{Real, Retention, Trace, checked_div, ensure_finite};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::{FieldId, Model, ModelKind};

/// Construction parameters for [`RcCircuit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcParams {
    /// Resistance (ohm)
    pub resistance: Real,
    /// Capacitance (farad)
    pub capacitance: Real,
    /// Initial charge (coulomb)
    #[serde(default)]
    pub charge: Real,
}

/// Series RC circuit driven by an input voltage.
///
/// Forward-Euler step on `dQ/dt = (Vin - Q/C) / R`. Each cycle the capacitor
/// voltage is taken from the charge at the start of the step, so
/// `Vin = Vr + Vc` and `Vr = i * R` hold for every recorded cycle.
#[derive(Debug, Clone)]
pub struct RcCircuit {
    dt: Real,
    r: Real,
    c: Real,
    vin: Trace,
    vc: Trace,
    vr: Trace,
    i: Trace,
    q: Trace,
}

impl RcCircuit {
    pub fn new(dt: Real, params: RcParams, retention: Retention) -> ModelResult<Self> {
        if !(dt > 0.0) {
            return Err(ModelError::InvalidParam {
                what: format!("dt must be positive, got {dt}"),
            });
        }
        let RcParams {
            resistance,
            capacitance,
            charge,
        } = params;
        checked_div(1.0, resistance, "RC resistance")?;
        let vc0 = checked_div(charge, capacitance, "RC capacitance")?;
        let vr0 = -vc0;
        let i0 = vr0 / resistance;
        Ok(Self {
            dt,
            r: resistance,
            c: capacitance,
            vin: Trace::new(0.0, retention),
            vc: Trace::new(vc0, retention),
            vr: Trace::new(vr0, retention),
            i: Trace::new(i0, retention),
            q: Trace::new(charge, retention),
        })
    }

    pub fn resistance(&self) -> Real {
        self.r
    }

    pub fn capacitance(&self) -> Real {
        self.c
    }

    /// Time constant `R * C` (seconds).
    pub fn tau(&self) -> Real {
        self.r * self.c
    }

    /// Advance one cycle; returns the new charge.
    pub fn step(&mut self, vin: Real) -> ModelResult<Real> {
        let q = self.q.last();
        let vc = checked_div(q, self.c, "RC capacitance")?;
        let vr = vin - vc;
        let i = checked_div(vr, self.r, "RC resistance")?;
        let q_next = ensure_finite(q + self.dt * i, "RC charge")?;

        self.vin.push(vin);
        self.vc.push(vc);
        self.vr.push(vr);
        self.i.push(i);
        self.q.push(q_next);
        Ok(q_next)
    }
}

impl Model for RcCircuit {
    fn kind(&self) -> ModelKind {
        ModelKind::Rc
    }

    fn calculate(&mut self, inputs: &[Real]) -> ModelResult<Real> {
        self.step(inputs[0])
    }

    fn reset(&mut self) {
        for trace in [
            &mut self.vin,
            &mut self.vc,
            &mut self.vr,
            &mut self.i,
            &mut self.q,
        ] {
            trace.reset();
        }
    }

    fn trace(&self, field: FieldId) -> Option<&Trace> {
        match field.index() {
            0 => Some(&self.vin),
            1 => Some(&self.vc),
            2 => Some(&self.vr),
            3 => Some(&self.i),
            4 => Some(&self.q),
            _ => None,
        }
    }

    fn input_default(&self, _input: usize) -> Option<Real> {
        None
    }

    fn set_param(&mut self, name: &str, value: Real) -> ModelResult<()> {
        match name {
            "R" | "resistance" => {
                checked_div(1.0, value, "RC resistance")?;
                self.r = value;
            }
            "C" | "capacitance" => {
                checked_div(1.0, value, "RC capacitance")?;
                self.c = value;
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

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::CoreError;

    fn rc(charge: Real) -> RcCircuit {
        RcCircuit::new(
            0.001,
            RcParams {
                resistance: 1.0,
                capacitance: 1.0,
                charge,
            },
            Retention::Full,
        )
        .unwrap()
    }

    #[test]
    fn single_step_matches_forward_euler() {
        let mut circuit = rc(0.0);
        let vin = 10.0;
        let q_next = 0.001 * (1.0 / 1.0) * (vin - 0.0) + 0.0;
        assert!((circuit.step(vin).unwrap() - q_next).abs() < 1e-12);
        assert_eq!(circuit.vc.last(), 0.0);
        assert_eq!(circuit.vr.last(), 10.0);
        assert_eq!(circuit.i.last(), 10.0);
    }

    #[test]
    fn kirchhoff_holds_every_cycle() {
        let mut circuit = rc(0.5);
        for k in 0..500 {
            let vin = if k < 250 { 5.0 } else { -2.0 };
            circuit.step(vin).unwrap();
            let vr = circuit.vr.last();
            assert!((vr - circuit.i.last() * circuit.r).abs() < 1e-12);
            assert!((circuit.vin.last() - vr - circuit.vc.last()).abs() < 1e-12);
        }
    }

    #[test]
    fn charges_towards_input() {
        let mut circuit = rc(0.0);
        for _ in 0..10_000 {
            circuit.step(1.0).unwrap();
        }
        // ten time constants
        assert!((circuit.vc.last() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn reset_restores_construction_state() {
        let fresh = rc(0.25);
        let mut circuit = fresh.clone();
        for _ in 0..20 {
            circuit.step(3.0).unwrap();
        }
        circuit.reset();
        circuit.reset();
        for id in 0..ModelKind::Rc.fields().len() {
            assert_eq!(circuit.trace(FieldId(id)), fresh.trace(FieldId(id)));
        }
    }

    #[test]
    fn zero_capacitance_is_arithmetic_error() {
        let err = RcCircuit::new(
            0.001,
            RcParams {
                resistance: 1.0,
                capacitance: 0.0,
                charge: 0.0,
            },
            Retention::Full,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::Arithmetic(CoreError::DivisionByZero { .. })
        ));
    }
}
