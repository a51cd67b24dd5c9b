//! Closed-loop performance measurements.
//!
//! A [`PerformanceMeter`] reads model history after every cycle and keeps
//! running figures of merit (overshoot, settling time). It never mutates the
//! simulator; it plugs in as a [`CycleObserver`].

pub mod measurement;

use std::ops::ControlFlow;

use cs_project::PerformanceMeterDef;
use cs_sim::{CycleObserver, SimError, SimResult, Simulator};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub use measurement::{Measurement, MeasurementKind, Overshoot, Probe, SettlingTime};

pub type MeterResult<T> = Result<T, MeterError>;

#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Unknown measurement class '{class}'")]
    UnknownClass { class: String },

    #[error("Malformed settings for measurement '{name}': {source}")]
    Settings {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Probe error: {what}")]
    Probe { what: String },

    #[error("Invalid setting: {what}")]
    InvalidSetting { what: String },

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] cs_core::CoreError),
}

/// Snapshot of one measurement, for reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "class")]
pub enum MeasurementReport {
    Overshoot {
        name: String,
        max: f64,
    },
    SettlingTime {
        name: String,
        settled: bool,
        settle_time: Option<f64>,
    },
}

/// Set of named measurements evaluated after every cycle.
#[derive(Debug, Clone)]
pub struct PerformanceMeter {
    enabled: bool,
    measurements: Vec<(String, Measurement)>,
}

impl PerformanceMeter {
    /// Build the configured measurements, binding their probes against
    /// `sim`. Unknown classes are skipped with a warning.
    pub fn new(def: &PerformanceMeterDef, sim: &Simulator) -> MeterResult<Self> {
        let mut measurements = Vec::new();
        for mea in &def.measurements {
            match Measurement::from_def(mea, sim) {
                Ok(m) => {
                    debug!(measurement = %mea.name, class = %mea.class, "measurement ready");
                    measurements.push((mea.name.clone(), m));
                }
                Err(MeterError::UnknownClass { class }) => {
                    warn!(measurement = %mea.name, %class, "unknown measurement class, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self {
            enabled: def.enabled,
            measurements,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Update every measurement from the simulator's latest values.
    pub fn calculate(&mut self, sim: &Simulator) -> MeterResult<()> {
        for (_, m) in &mut self.measurements {
            m.calculate(sim)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.measurements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    pub fn overshoot(&self, name: &str) -> Option<&Overshoot> {
        match self.get(name)? {
            Measurement::Overshoot(o) => Some(o),
            _ => None,
        }
    }

    pub fn settling_time(&self, name: &str) -> Option<&SettlingTime> {
        match self.get(name)? {
            Measurement::SettlingTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Forget accumulated results, keeping the configuration.
    pub fn reset(&mut self) {
        for (_, m) in &mut self.measurements {
            m.reset();
        }
    }

    pub fn report(&self) -> Vec<MeasurementReport> {
        self.measurements
            .iter()
            .map(|(name, m)| match m {
                Measurement::Overshoot(o) => MeasurementReport::Overshoot {
                    name: name.clone(),
                    max: o.max(),
                },
                Measurement::SettlingTime(s) => MeasurementReport::SettlingTime {
                    name: name.clone(),
                    settled: s.settled(),
                    settle_time: s.settle_time(),
                },
            })
            .collect()
    }
}

impl CycleObserver for PerformanceMeter {
    fn after_cycle(&mut self, sim: &Simulator) -> SimResult<ControlFlow<()>> {
        if self.enabled {
            self.calculate(sim).map_err(|e| SimError::Observer {
                what: e.to_string(),
            })?;
        }
        Ok(ControlFlow::Continue(()))
    }
}
