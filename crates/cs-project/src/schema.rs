//! Project schema definitions.

use std::collections::BTreeMap;

use cs_core::Retention;
use serde::{Deserialize, Serialize};

/// Newest project file version this crate understands.
pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub simulation: SimulationDef,
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_meter: Option<PerformanceMeterDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuner: Option<TunerDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationDef {
    /// Cycle duration (seconds)
    pub dt: f64,
    /// Simulated span (seconds); the cycle count is `duration / dt`, truncated.
    pub duration: f64,
    #[serde(default)]
    pub retention: Retention,
    #[serde(default)]
    pub tie_policy: TiePolicy,
}

/// How models registered with an already-used `order` are placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Insert before every existing entry of equal order.
    #[default]
    NewestFirst,
    /// Refuse the registration.
    Reject,
}

/// One model in the simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// Model kind, e.g. `RC` or `PIDAntiWindup`.
    pub class: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Kind-specific parameters, decoded at registration.
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
    #[serde(default)]
    pub inputs: BTreeMap<String, SourceDef>,
}

fn default_enabled() -> bool {
    true
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Where an input takes its value from.
///
/// The variant is picked from the keys present: `{model, variable}`,
/// `{variable}` or `{value}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SourceDef {
    /// Latest value of another model's field.
    Model { model: String, variable: String },
    /// A simulator field such as `current_cycle` or `t`.
    Simulator { variable: String },
    Constant { value: f64 },
}

/// Reference to one model field, read by measurements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeDef {
    #[serde(alias = "object_name")]
    pub model: String,
    #[serde(alias = "attribute")]
    pub variable: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMeterDef {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub measurements: Vec<MeasurementDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementDef {
    pub name: String,
    /// Measurement kind, e.g. `Overshoot` or `SettlingTime`.
    pub class: String,
    #[serde(default = "empty_params")]
    pub settings: serde_json::Value,
}

/// Grid search over the gains of one PID model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TunerDef {
    /// Name of the PID model to tune.
    pub regulator: String,
    #[serde(default = "default_p_range")]
    pub p_range: [f64; 2],
    #[serde(default = "default_i_range")]
    pub i_range: [f64; 2],
    #[serde(default = "default_d_range")]
    pub d_range: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_steps: Option<usize>,
    /// Step count for every axis without its own setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<usize>,
    /// Budget split across axes when neither per-axis steps nor `steps` are set.
    #[serde(default = "default_max_combinations")]
    pub max_combinations: usize,
    pub cost: CostDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<RecurringDef>,
}

fn default_p_range() -> [f64; 2] {
    [1.0, 11.0]
}

fn default_i_range() -> [f64; 2] {
    [0.0, 10.0]
}

fn default_d_range() -> [f64; 2] {
    [0.0, 10.0]
}

fn default_max_combinations() -> usize {
    1000
}

/// Weights turning meter results into a scalar cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostDef {
    pub overshoot: OvershootCostDef,
    pub settling_time: SettlingCostDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OvershootCostDef {
    /// Measurement name in the performance meter.
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlingCostDef {
    /// Measurement name in the performance meter.
    pub name: String,
    pub weight: f64,
    /// Cost charged when the response never settles.
    pub not_settled_penalty: f64,
}

/// Zooming repetition of the grid search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringDef {
    /// Each round shrinks every range by this factor around the best point.
    pub divider: f64,
    /// Stop once the relative improvement of a round is at or below this.
    pub threshold: f64,
    pub max_loop_runs: usize,
}
