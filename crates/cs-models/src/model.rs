//! The common model capability and the closed set of model kinds.

use std::fmt;
use std::str::FromStr;

use cs_core::{Real, Retention, Trace};
use serde::de::DeserializeOwned;

use crate::error::{ModelError, ModelResult};
use crate::motor::{DcMotor, DcMotorParams};
use crate::pid::{PidController, PidParams};
use crate::rc::{RcCircuit, RcParams};
use crate::rl::{RlCircuit, RlParams};
use crate::signal::{SignalGenerator, SignalGeneratorParams};

/// Index of an observable field within a model kind's field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub usize);

impl FieldId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A simulated unit stepped once per cycle.
pub trait Model {
    /// Kind tag of this model.
    fn kind(&self) -> ModelKind;

    /// Consume this cycle's inputs (ordered as [`ModelKind::inputs`]),
    /// append one value to every trace and return the primary output.
    fn calculate(&mut self, inputs: &[Real]) -> ModelResult<Real>;

    /// Restore every trace and internal operator to its state right after
    /// construction. Parameters set through [`Model::set_param`] are kept.
    fn reset(&mut self);

    /// History of one observable field.
    fn trace(&self, field: FieldId) -> Option<&Trace>;

    /// Value used for an optional input that is not wired.
    ///
    /// `None` means the input is required.
    fn input_default(&self, input: usize) -> Option<Real>;

    /// Retune a parameter in place.
    fn set_param(&mut self, name: &str, value: Real) -> ModelResult<()>;

    /// Resolve a field name to its id.
    fn field_id(&self, name: &str) -> Option<FieldId> {
        self.kind().field_id(name)
    }

    /// Latest value of a named field.
    fn latest(&self, name: &str) -> Option<Real> {
        self.field_id(name)
            .and_then(|id| self.trace(id))
            .map(Trace::last)
    }
}

/// Closed enumeration of the model kinds the engine can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Rc,
    Rl,
    RlClamped,
    DcMotor,
    SignalGenerator,
    /// PID without output limits.
    Pid,
    /// PID with output limits, no anti-windup.
    PidLimited,
    /// PID with output limits and anti-windup back-calculation.
    PidAntiWindup,
}

const RC_FIELDS: &[&str] = &["Vin", "Vc", "Vr", "i", "Q"];
const RL_FIELDS: &[&str] = &["Vin", "Vr", "Vl", "i", "Vd", "Rd"];
const MOTOR_FIELDS: &[&str] = &["Ve", "Va", "Tl", "ie", "ia", "w", "theta", "Te"];
const SIGNAL_FIELDS: &[&str] = &["value"];
const PID_FIELDS: &[&str] = &["SP", "PV", "FWD", "error", "P", "I", "D", "MV"];

const RC_INPUTS: &[&str] = &["Vin"];
const RL_INPUTS: &[&str] = &["Vin"];
const MOTOR_INPUTS: &[&str] = &["Ve", "Va", "Tl"];
const SIGNAL_INPUTS: &[&str] = &["cycle"];
const PID_INPUTS: &[&str] = &["SP", "PV", "FWD"];

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::Rc,
        ModelKind::Rl,
        ModelKind::RlClamped,
        ModelKind::DcMotor,
        ModelKind::SignalGenerator,
        ModelKind::Pid,
        ModelKind::PidLimited,
        ModelKind::PidAntiWindup,
    ];

    /// Canonical class name used in model specifications.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Rc => "RC",
            ModelKind::Rl => "RL",
            ModelKind::RlClamped => "RLClamped",
            ModelKind::DcMotor => "ElectricMotor",
            ModelKind::SignalGenerator => "SignalGenerator",
            ModelKind::Pid => "PID",
            ModelKind::PidLimited => "PIDLimited",
            ModelKind::PidAntiWindup => "PIDAntiWindup",
        }
    }

    /// Observable fields, in [`FieldId`] order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            ModelKind::Rc => RC_FIELDS,
            ModelKind::Rl | ModelKind::RlClamped => RL_FIELDS,
            ModelKind::DcMotor => MOTOR_FIELDS,
            ModelKind::SignalGenerator => SIGNAL_FIELDS,
            ModelKind::Pid | ModelKind::PidLimited | ModelKind::PidAntiWindup => PID_FIELDS,
        }
    }

    /// Named inputs, in the order `calculate` expects them.
    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            ModelKind::Rc => RC_INPUTS,
            ModelKind::Rl | ModelKind::RlClamped => RL_INPUTS,
            ModelKind::DcMotor => MOTOR_INPUTS,
            ModelKind::SignalGenerator => SIGNAL_INPUTS,
            ModelKind::Pid | ModelKind::PidLimited | ModelKind::PidAntiWindup => PID_INPUTS,
        }
    }

    pub fn field_id(self, name: &str) -> Option<FieldId> {
        self.fields().iter().position(|f| *f == name).map(FieldId)
    }

    pub fn input_index(self, name: &str) -> Option<usize> {
        self.inputs().iter().position(|f| *f == name)
    }

    pub fn is_pid(self) -> bool {
        matches!(
            self,
            ModelKind::Pid | ModelKind::PidLimited | ModelKind::PidAntiWindup
        )
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "RC" => ModelKind::Rc,
            "RL" => ModelKind::Rl,
            "RLClamped" | "RLVrClamped" => ModelKind::RlClamped,
            "ElectricMotor" | "DCMotor" => ModelKind::DcMotor,
            "SignalGenerator" => ModelKind::SignalGenerator,
            "PID" | "Pid" => ModelKind::Pid,
            "PIDLimited" | "PidLimited" => ModelKind::PidLimited,
            "PIDAntiWindup" | "PidAntiWindup" => ModelKind::PidAntiWindup,
            other => {
                return Err(ModelError::UnknownKind {
                    class: other.to_string(),
                });
            }
        };
        Ok(kind)
    }
}

/// A constructed model of any kind.
#[derive(Debug, Clone)]
pub enum ModelInstance {
    Rc(RcCircuit),
    Rl(RlCircuit),
    DcMotor(DcMotor),
    SignalGenerator(SignalGenerator),
    Pid(PidController),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            ModelInstance::Rc($m) => $body,
            ModelInstance::Rl($m) => $body,
            ModelInstance::DcMotor($m) => $body,
            ModelInstance::SignalGenerator($m) => $body,
            ModelInstance::Pid($m) => $body,
        }
    };
}

impl Model for ModelInstance {
    fn kind(&self) -> ModelKind {
        dispatch!(self, m => m.kind())
    }

    fn calculate(&mut self, inputs: &[Real]) -> ModelResult<Real> {
        let kind = self.kind();
        let expected = kind.inputs().len();
        if inputs.len() != expected {
            return Err(ModelError::InputArity {
                kind,
                expected,
                got: inputs.len(),
            });
        }
        dispatch!(self, m => m.calculate(inputs))
    }

    fn reset(&mut self) {
        dispatch!(self, m => m.reset())
    }

    fn trace(&self, field: FieldId) -> Option<&Trace> {
        dispatch!(self, m => m.trace(field))
    }

    fn input_default(&self, input: usize) -> Option<Real> {
        dispatch!(self, m => m.input_default(input))
    }

    fn set_param(&mut self, name: &str, value: Real) -> ModelResult<()> {
        dispatch!(self, m => m.set_param(name, value))
    }
}

impl ModelInstance {
    pub fn as_pid(&self) -> Option<&PidController> {
        match self {
            ModelInstance::Pid(pid) => Some(pid),
            _ => None,
        }
    }

    pub fn as_pid_mut(&mut self) -> Option<&mut PidController> {
        match self {
            ModelInstance::Pid(pid) => Some(pid),
            _ => None,
        }
    }
}

fn decode<P: DeserializeOwned>(kind: ModelKind, params: &serde_json::Value) -> ModelResult<P> {
    P::deserialize(params).map_err(|source| ModelError::Params { kind, source })
}

/// Instantiate a model of `kind` from its untyped parameter mapping.
///
/// `dt` is the simulator's cycle duration; it is injected here rather than
/// read from `params`.
pub fn build_model(
    kind: ModelKind,
    params: &serde_json::Value,
    dt: Real,
    retention: Retention,
) -> ModelResult<ModelInstance> {
    let model = match kind {
        ModelKind::Rc => {
            let p: RcParams = decode(kind, params)?;
            ModelInstance::Rc(RcCircuit::new(dt, p, retention)?)
        }
        ModelKind::Rl => {
            let p: RlParams = decode(kind, params)?;
            if p.vr_max.is_some() {
                return Err(ModelError::InvalidParam {
                    what: "RL takes no vr_max; use RLClamped".to_string(),
                });
            }
            ModelInstance::Rl(RlCircuit::new(dt, p, retention)?)
        }
        ModelKind::RlClamped => {
            let p: RlParams = decode(kind, params)?;
            if p.vr_max.is_none() {
                return Err(ModelError::InvalidParam {
                    what: "RLClamped requires vr_max".to_string(),
                });
            }
            ModelInstance::Rl(RlCircuit::new(dt, p, retention)?)
        }
        ModelKind::DcMotor => {
            let p: DcMotorParams = decode(kind, params)?;
            ModelInstance::DcMotor(DcMotor::new(dt, p, retention)?)
        }
        ModelKind::SignalGenerator => {
            let p: SignalGeneratorParams = decode(kind, params)?;
            ModelInstance::SignalGenerator(SignalGenerator::new(p.events, retention))
        }
        ModelKind::Pid | ModelKind::PidLimited | ModelKind::PidAntiWindup => {
            let p: PidParams = decode(kind, params)?;
            ModelInstance::Pid(PidController::from_params(kind, dt, p, retention)?)
        }
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_names_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn every_class_spelling_registers() {
        let spellings = [
            ("RC", ModelKind::Rc),
            ("RL", ModelKind::Rl),
            ("RLClamped", ModelKind::RlClamped),
            ("RLVrClamped", ModelKind::RlClamped),
            ("ElectricMotor", ModelKind::DcMotor),
            ("DCMotor", ModelKind::DcMotor),
            ("SignalGenerator", ModelKind::SignalGenerator),
            ("PID", ModelKind::Pid),
            ("Pid", ModelKind::Pid),
            ("PIDLimited", ModelKind::PidLimited),
            ("PidLimited", ModelKind::PidLimited),
            ("PIDAntiWindup", ModelKind::PidAntiWindup),
            ("PidAntiWindup", ModelKind::PidAntiWindup),
        ];
        for (class, kind) in spellings {
            assert_eq!(class.parse::<ModelKind>().unwrap(), kind, "{class}");
        }
    }

    #[test]
    fn documented_regulator_builds() {
        let kind: ModelKind = "PidAntiWindup".parse().unwrap();
        let params = json!({"Kp": 2.0, "Ti": 0.5, "Td": 0.0, "min_MV": -10, "max_MV": 10});
        let model = build_model(kind, &params, 0.001, Retention::Full).unwrap();
        assert_eq!(model.kind(), ModelKind::PidAntiWindup);
        assert!(model.as_pid().unwrap().config().anti_windup);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "Thermostat".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, ModelError::UnknownKind { .. }));
    }

    #[test]
    fn field_ids_follow_declaration_order() {
        assert_eq!(ModelKind::Rc.field_id("Vc"), Some(FieldId(1)));
        assert_eq!(ModelKind::PidAntiWindup.field_id("MV"), Some(FieldId(7)));
        assert_eq!(ModelKind::Rc.field_id("MV"), None);
    }

    #[test]
    fn build_rc_from_params() {
        let params = json!({"resistance": 1.0, "capacitance": 2.0, "charge": 4.0});
        let model = build_model(ModelKind::Rc, &params, 0.01, Retention::Full).unwrap();
        assert_eq!(model.kind(), ModelKind::Rc);
        assert_eq!(model.latest("Q"), Some(4.0));
        assert_eq!(model.latest("Vc"), Some(2.0));
    }

    #[test]
    fn malformed_params_are_reported() {
        let params = json!({"resistance": "high"});
        let err = build_model(ModelKind::Rc, &params, 0.01, Retention::Full).unwrap_err();
        assert!(matches!(err, ModelError::Params { .. }));
    }

    #[test]
    fn clamped_rl_requires_ceiling() {
        let params = json!({"resistance": 1.0, "inductance": 1.0, "current": 0.0});
        let err = build_model(ModelKind::RlClamped, &params, 0.01, Retention::Full).unwrap_err();
        assert!(matches!(err, ModelError::InvalidParam { .. }));
    }

    #[test]
    fn plain_rl_refuses_ceiling() {
        let params = json!({"resistance": 1.0, "inductance": 1.0, "vr_max": 2.0});
        let err = build_model(ModelKind::Rl, &params, 0.01, Retention::Full).unwrap_err();
        assert!(matches!(err, ModelError::InvalidParam { .. }));
        let clamped = build_model(ModelKind::RlClamped, &params, 0.01, Retention::Full).unwrap();
        assert_eq!(clamped.kind(), ModelKind::RlClamped);
    }

    #[test]
    fn input_arity_is_checked() {
        let params = json!({"resistance": 1.0, "capacitance": 1.0, "charge": 0.0});
        let mut model = build_model(ModelKind::Rc, &params, 0.01, Retention::Full).unwrap();
        let err = model.calculate(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ModelError::InputArity { expected: 1, got: 2, .. }));
    }
}
