//! Separately excited DC motor.

use cs_core::{Real, Retention, Trace, checked_div, ensure_finite};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::{FieldId, Model, ModelKind};

/// Construction parameters for [`DcMotor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcMotorParams {
    pub coil_turns: Real,
    /// Coil wire size (m)
    pub coil_size: Real,
    /// Magnetic permeability (H/m)
    pub magnetic_permea: Real,
    /// Solenoid length (m)
    pub solenoid_length: Real,
    /// Solenoid cross-section area (m²)
    pub solenoid_area: Real,
    pub stator_induc: Real,
    pub stator_resist: Real,
    pub rotor_induc: Real,
    pub rotor_resist: Real,
    /// Rotor inertia (kg·m²)
    pub rotor_inertia: Real,
    /// Viscous friction coefficient (N·m·s/rad)
    pub viscous_friction: Real,
    /// Load torque used when the `Tl` input is not wired (N·m)
    #[serde(default)]
    pub load_torque: Real,
    #[serde(default)]
    pub stator_current: Real,
    #[serde(default)]
    pub rotor_current: Real,
    #[serde(default)]
    pub rotor_speed: Real,
    #[serde(default)]
    pub rotor_position: Real,
}

/// Gains and time constants of the three coupled loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConstants {
    /// Stator gain `1/Re` and time constant `Le/Re`
    pub stator: (Real, Real),
    /// Rotor gain `1/Ra` and time constant `La/Ra`
    pub rotor: (Real, Real),
    /// Mechanical gain `1/F` and time constant `J/F`
    pub mechanical: (Real, Real),
}

/// Linear two-winding DC motor.
///
/// Assumes a linear magnetic circuit, viscous friction only and single
/// stator and rotor coils. The windings are coupled by `K`, derived once
/// from the coil geometry:
///
/// ```text
/// K0 = mu * A / l,  Kphi = l * d / A,  K = Kphi * K0 * N
///
/// Le * die/dt = Ve - Re * ie
/// La * dia/dt = Va - Ra * ia - K * ie * w
/// J  * dw/dt  = K * ie * ia - F * w - Tl
///      dθ/dt  = w
/// ```
///
/// Integrated with forward Euler; `calculate` returns the angular speed.
#[derive(Debug, Clone)]
pub struct DcMotor {
    dt: Real,
    k: Real,
    le: Real,
    re: Real,
    la: Real,
    ra: Real,
    j: Real,
    f: Real,
    load_torque: Real,
    ve: Trace,
    va: Trace,
    tl: Trace,
    ie: Trace,
    ia: Trace,
    w: Trace,
    theta: Trace,
    te: Trace,
}

impl DcMotor {
    pub fn new(dt: Real, p: DcMotorParams, retention: Retention) -> ModelResult<Self> {
        if !(dt > 0.0) {
            return Err(ModelError::InvalidParam {
                what: format!("dt must be positive, got {dt}"),
            });
        }
        let k0 = checked_div(
            p.magnetic_permea * p.solenoid_area,
            p.solenoid_length,
            "motor solenoid length",
        )?;
        let kphi = checked_div(
            p.solenoid_length * p.coil_size,
            p.solenoid_area,
            "motor solenoid area",
        )?;
        let k = kphi * k0 * p.coil_turns;

        checked_div(1.0, p.stator_induc, "motor stator inductance")?;
        checked_div(1.0, p.rotor_induc, "motor rotor inductance")?;
        checked_div(1.0, p.rotor_inertia, "motor rotor inertia")?;
        checked_div(1.0, p.stator_resist, "motor stator resistance")?;
        checked_div(1.0, p.rotor_resist, "motor rotor resistance")?;
        checked_div(1.0, p.viscous_friction, "motor viscous friction")?;

        let te0 = k * p.stator_current * p.rotor_current;
        Ok(Self {
            dt,
            k,
            le: p.stator_induc,
            re: p.stator_resist,
            la: p.rotor_induc,
            ra: p.rotor_resist,
            j: p.rotor_inertia,
            f: p.viscous_friction,
            load_torque: p.load_torque,
            ve: Trace::new(0.0, retention),
            va: Trace::new(0.0, retention),
            tl: Trace::new(p.load_torque, retention),
            ie: Trace::new(p.stator_current, retention),
            ia: Trace::new(p.rotor_current, retention),
            w: Trace::new(p.rotor_speed, retention),
            theta: Trace::new(p.rotor_position, retention),
            te: Trace::new(te0, retention),
        })
    }

    /// Electromagnetic coupling constant.
    pub fn coupling(&self) -> Real {
        self.k
    }

    pub fn loop_constants(&self) -> LoopConstants {
        LoopConstants {
            stator: (1.0 / self.re, self.le / self.re),
            rotor: (1.0 / self.ra, self.la / self.ra),
            mechanical: (1.0 / self.f, self.j / self.f),
        }
    }

    /// Advance one cycle; returns the new angular speed.
    pub fn step(&mut self, ve: Real, va: Real, tl: Real) -> ModelResult<Real> {
        let (ie, ia) = (self.ie.last(), self.ia.last());
        let (w, theta) = (self.w.last(), self.theta.last());

        let die = (ve - self.re * ie) / self.le;
        let dia = (va - self.ra * ia - self.k * ie * w) / self.la;
        let te = self.k * ie * ia;
        let dw = (te - self.f * w - tl) / self.j;

        let ie_next = ensure_finite(ie + self.dt * die, "motor stator current")?;
        let ia_next = ensure_finite(ia + self.dt * dia, "motor rotor current")?;
        let w_next = ensure_finite(w + self.dt * dw, "motor speed")?;
        let theta_next = ensure_finite(theta + self.dt * w, "motor position")?;

        self.ve.push(ve);
        self.va.push(va);
        self.tl.push(tl);
        self.ie.push(ie_next);
        self.ia.push(ia_next);
        self.w.push(w_next);
        self.theta.push(theta_next);
        self.te.push(te);
        Ok(w_next)
    }
}

impl Model for DcMotor {
    fn kind(&self) -> ModelKind {
        ModelKind::DcMotor
    }

    fn calculate(&mut self, inputs: &[Real]) -> ModelResult<Real> {
        self.step(inputs[0], inputs[1], inputs[2])
    }

    fn reset(&mut self) {
        for trace in [
            &mut self.ve,
            &mut self.va,
            &mut self.tl,
            &mut self.ie,
            &mut self.ia,
            &mut self.w,
            &mut self.theta,
            &mut self.te,
        ] {
            trace.reset();
        }
    }

    fn trace(&self, field: FieldId) -> Option<&Trace> {
        match field.index() {
            0 => Some(&self.ve),
            1 => Some(&self.va),
            2 => Some(&self.tl),
            3 => Some(&self.ie),
            4 => Some(&self.ia),
            5 => Some(&self.w),
            6 => Some(&self.theta),
            7 => Some(&self.te),
            _ => None,
        }
    }

    fn input_default(&self, input: usize) -> Option<Real> {
        // Tl falls back to the configured load torque
        (input == 2).then_some(self.load_torque)
    }

    fn set_param(&mut self, name: &str, value: Real) -> ModelResult<()> {
        match name {
            "Tl" | "load_torque" => self.load_torque = value,
            "F" | "viscous_friction" => {
                checked_div(1.0, value, "motor viscous friction")?;
                self.f = value;
            }
            "J" | "rotor_inertia" => {
                checked_div(1.0, value, "motor rotor inertia")?;
                self.j = value;
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
