//! Individual measurements and the probes they read.

use std::str::FromStr;

use cs_core::{Differentiator, Real, Trace};
use cs_models::{FieldId, Model};
use cs_project::{MeasurementDef, ProbeDef};
use cs_sim::Simulator;
use serde::Deserialize;

use crate::{MeterError, MeterResult};

/// A model field bound by name at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    model: String,
    variable: String,
    field: FieldId,
}

impl Probe {
    pub fn bind(def: &ProbeDef, sim: &Simulator) -> MeterResult<Self> {
        let model = sim.model(&def.model).ok_or_else(|| MeterError::Probe {
            what: format!("no model named '{}'", def.model),
        })?;
        let field = model.field_id(&def.variable).ok_or_else(|| MeterError::Probe {
            what: format!("{} has no field '{}'", model.kind(), def.variable),
        })?;
        Ok(Self {
            model: def.model.clone(),
            variable: def.variable.clone(),
            field,
        })
    }

    /// Latest value of the probed field.
    pub fn read(&self, sim: &Simulator) -> MeterResult<Real> {
        sim.model(&self.model)
            .and_then(|m| m.trace(self.field))
            .map(Trace::last)
            .ok_or_else(|| MeterError::Probe {
                what: format!("'{}.{}' is no longer available", self.model, self.variable),
            })
    }
}

/// Closed set of measurement classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    Overshoot,
    SettlingTime,
}

impl FromStr for MeasurementKind {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Overshoot" => Ok(MeasurementKind::Overshoot),
            "SettlingTime" => Ok(MeasurementKind::SettlingTime),
            other => Err(MeterError::UnknownClass {
                class: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OvershootSettings {
    #[serde(rename = "Y")]
    y: ProbeDef,
    #[serde(rename = "SP")]
    sp: ProbeDef,
}

#[derive(Debug, Deserialize)]
struct SettlingSettings {
    #[serde(rename = "Y")]
    y: ProbeDef,
    #[serde(rename = "SP")]
    sp: ProbeDef,
    dx_threshold: Real,
    range: Real,
}

/// Running maximum of `Y / SP`.
///
/// Cycles with a zero setpoint carry no ratio and are skipped.
#[derive(Debug, Clone)]
pub struct Overshoot {
    y: Probe,
    sp: Probe,
    max: Real,
}

impl Overshoot {
    pub fn new(y: Probe, sp: Probe) -> Self {
        Self { y, sp, max: 0.0 }
    }

    /// Largest ratio seen so far.
    pub fn max(&self) -> Real {
        self.max
    }

    pub fn calculate(&mut self, sim: &Simulator) -> MeterResult<Real> {
        let y = self.y.read(sim)?;
        let sp = self.sp.read(sim)?;
        if sp != 0.0 {
            let ratio = y / sp;
            if ratio > self.max {
                self.max = ratio;
            }
        }
        Ok(self.max)
    }

    pub fn reset(&mut self) {
        self.max = 0.0;
    }
}

/// Time at which `Y` entered and stayed in a band around `SP`.
///
/// A cycle counts as settled when `|Y - SP| / |SP| < range` and
/// `|dY/dt| < dx_threshold`. The first settled time is kept while the
/// signal stays settled; leaving the band clears it.
#[derive(Debug, Clone)]
pub struct SettlingTime {
    y: Probe,
    sp: Probe,
    dx_threshold: Real,
    range: Real,
    derivative: Differentiator,
    settled: bool,
    settle_time: Option<Real>,
}

impl SettlingTime {
    pub fn new(y: Probe, sp: Probe, dx_threshold: Real, range: Real) -> MeterResult<Self> {
        if !(dx_threshold > 0.0) || !(range > 0.0) {
            return Err(MeterError::InvalidSetting {
                what: format!(
                    "dx_threshold ({dx_threshold}) and range ({range}) must be positive"
                ),
            });
        }
        Ok(Self {
            y,
            sp,
            dx_threshold,
            range,
            derivative: Differentiator::new(),
            settled: false,
            settle_time: None,
        })
    }

    pub fn settled(&self) -> bool {
        self.settled
    }

    pub fn settle_time(&self) -> Option<Real> {
        self.settle_time
    }

    pub fn calculate(&mut self, sim: &Simulator) -> MeterResult<bool> {
        let y = self.y.read(sim)?;
        let sp = self.sp.read(sim)?;
        let rate = self.derivative.calculate(sim.dt(), y)?;

        let within = sp != 0.0 && ((y - sp) / sp).abs() < self.range;
        let stable = rate.abs() < self.dx_threshold;
        if within && stable {
            if !self.settled {
                self.settle_time = Some(sim.time());
            }
            self.settled = true;
        } else {
            self.settled = false;
            self.settle_time = None;
        }
        Ok(self.settled)
    }

    pub fn reset(&mut self) {
        self.derivative.clear();
        self.settled = false;
        self.settle_time = None;
    }
}

#[derive(Debug, Clone)]
pub enum Measurement {
    Overshoot(Overshoot),
    SettlingTime(SettlingTime),
}

impl Measurement {
    pub fn from_def(def: &MeasurementDef, sim: &Simulator) -> MeterResult<Self> {
        let kind: MeasurementKind = def.class.parse()?;
        let settings_err = |source| MeterError::Settings {
            name: def.name.clone(),
            source,
        };
        let m = match kind {
            MeasurementKind::Overshoot => {
                let s = OvershootSettings::deserialize(&def.settings).map_err(settings_err)?;
                Measurement::Overshoot(Overshoot::new(
                    Probe::bind(&s.y, sim)?,
                    Probe::bind(&s.sp, sim)?,
                ))
            }
            MeasurementKind::SettlingTime => {
                let s = SettlingSettings::deserialize(&def.settings).map_err(settings_err)?;
                Measurement::SettlingTime(SettlingTime::new(
                    Probe::bind(&s.y, sim)?,
                    Probe::bind(&s.sp, sim)?,
                    s.dx_threshold,
                    s.range,
                )?)
            }
        };
        Ok(m)
    }

    pub fn kind(&self) -> MeasurementKind {
        match self {
            Measurement::Overshoot(_) => MeasurementKind::Overshoot,
            Measurement::SettlingTime(_) => MeasurementKind::SettlingTime,
        }
    }

    pub fn calculate(&mut self, sim: &Simulator) -> MeterResult<()> {
        match self {
            Measurement::Overshoot(o) => o.calculate(sim).map(|_| ()),
            Measurement::SettlingTime(s) => s.calculate(sim).map(|_| ()),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Measurement::Overshoot(o) => o.reset(),
            Measurement::SettlingTime(s) => s.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerformanceMeter;
    use cs_project::{ModelSpec, PerformanceMeterDef, SourceDef};
    use cs_sim::SimOptions;
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Setpoint held at `sp`; RC charged towards `vin`.
    fn sim(sp: f64, vin: f64, duration: f64) -> Simulator {
        let mut inputs = BTreeMap::new();
        inputs.insert("cycle".to_string(), SourceDef::Simulator {
            variable: "cycle".to_string(),
        });
        let sig = ModelSpec {
            name: "sp".to_string(),
            class: "SignalGenerator".to_string(),
            order: 0,
            enabled: true,
            params: json!({"events": [{"start": {"value": sp}}]}),
            inputs,
        };
        let mut inputs = BTreeMap::new();
        inputs.insert("Vin".to_string(), SourceDef::Constant { value: vin });
        let rc = ModelSpec {
            name: "rc".to_string(),
            class: "RC".to_string(),
            order: 1,
            enabled: true,
            params: json!({"resistance": 1.0, "capacitance": 0.1}),
            inputs,
        };
        Simulator::from_specs(SimOptions::new(0.001, duration), &[sig, rc]).unwrap()
    }

    fn meter_def() -> PerformanceMeterDef {
        serde_json::from_value(json!({
            "enabled": true,
            "measurements": [
                {"name": "overshoot", "class": "Overshoot",
                 "settings": {"Y": {"model": "rc", "variable": "Vc"}, "SP": {"model": "sp", "variable": "value"}}},
                {"name": "settling", "class": "SettlingTime",
                 "settings": {"Y": {"object_name": "rc", "attribute": "Vc"}, "SP": {"model": "sp", "variable": "value"},
                              "dx_threshold": 0.5, "range": 0.02}},
                {"name": "rise", "class": "RiseTime", "settings": {}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn unknown_class_is_skipped() {
        let s = sim(1.0, 1.0, 0.1);
        let meter = PerformanceMeter::new(&meter_def(), &s).unwrap();
        assert_eq!(meter.len(), 2);
        assert!(meter.get("rise").is_none());
    }

    #[test]
    fn bad_probe_is_an_error() {
        let s = sim(1.0, 1.0, 0.1);
        let mut def = meter_def();
        def.measurements[0].settings = json!({
            "Y": {"model": "rc", "variable": "MV"},
            "SP": {"model": "sp", "variable": "value"}
        });
        assert!(matches!(
            PerformanceMeter::new(&def, &s),
            Err(MeterError::Probe { .. })
        ));
    }

    #[test]
    fn first_order_response_settles_without_overshoot() {
        let mut s = sim(1.0, 1.0, 1.0);
        let mut meter = PerformanceMeter::new(&meter_def(), &s).unwrap();
        s.run_with_observer(&mut meter).unwrap();

        let overshoot = meter.overshoot("overshoot").unwrap();
        assert!(overshoot.max() <= 1.0);
        assert!(overshoot.max() > 0.98);

        let settling = meter.settling_time("settling").unwrap();
        assert!(settling.settled());
        // 2% band of a tau = 0.1 s lag is reached near 4 tau
        let t = settling.settle_time().unwrap();
        assert!(t > 0.35 && t < 0.45, "settled at {t}");
    }

    #[test]
    fn overshoot_above_setpoint_is_recorded() {
        let mut s = sim(0.5, 1.0, 1.0);
        let mut meter = PerformanceMeter::new(&meter_def(), &s).unwrap();
        s.run_with_observer(&mut meter).unwrap();
        assert!(meter.overshoot("overshoot").unwrap().max() > 1.9);
        assert!(!meter.settling_time("settling").unwrap().settled());
    }

    #[test]
    fn zero_setpoint_cycles_are_skipped() {
        let mut s = sim(0.0, 1.0, 0.1);
        let mut meter = PerformanceMeter::new(&meter_def(), &s).unwrap();
        s.run_with_observer(&mut meter).unwrap();
        assert_eq!(meter.overshoot("overshoot").unwrap().max(), 0.0);
        assert!(!meter.settling_time("settling").unwrap().settled());
    }

    #[test]
    fn disabled_meter_does_not_measure() {
        let mut s = sim(1.0, 1.0, 0.2);
        let mut def = meter_def();
        def.enabled = false;
        let mut meter = PerformanceMeter::new(&def, &s).unwrap();
        s.run_with_observer(&mut meter).unwrap();
        assert_eq!(meter.overshoot("overshoot").unwrap().max(), 0.0);
    }

    #[test]
    fn reset_clears_results() {
        let mut s = sim(1.0, 1.0, 1.0);
        let mut meter = PerformanceMeter::new(&meter_def(), &s).unwrap();
        s.run_with_observer(&mut meter).unwrap();
        meter.reset();
        assert_eq!(meter.overshoot("overshoot").unwrap().max(), 0.0);
        assert_eq!(meter.settling_time("settling").unwrap().settle_time(), None);
    }
}
