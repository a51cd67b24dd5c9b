//! Run reports, trace export and `--set` parsing.

use std::collections::BTreeMap;

use cs_core::{Real, Retention};
use cs_metrics::{MeasurementReport, PerformanceMeter};
use cs_models::Model;
use cs_project::Project;
use cs_sim::{RunSummary, Simulator};
use serde::Serialize;

use crate::error::{CliError, CliResult};

/// JSON summary of one `run`.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub project: String,
    pub timestamp: String,
    pub dt: Real,
    pub cycles: usize,
    pub t_end: Real,
    pub stopped_early: bool,
    pub final_values: BTreeMap<String, BTreeMap<String, Real>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub measurements: Vec<MeasurementReport>,
}

impl RunReport {
    pub fn new(
        project: &str,
        sim: &Simulator,
        summary: &RunSummary,
        meter: Option<&PerformanceMeter>,
    ) -> Self {
        Self {
            project: project.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            dt: sim.dt(),
            cycles: summary.cycles,
            t_end: summary.t_end,
            stopped_early: summary.stopped_early,
            final_values: final_values(sim),
            measurements: meter.map(PerformanceMeter::report).unwrap_or_default(),
        }
    }
}

/// Latest value of every field of every model.
pub fn final_values(sim: &Simulator) -> BTreeMap<String, BTreeMap<String, Real>> {
    sim.models()
        .map(|(name, model)| {
            let fields = model
                .kind()
                .fields()
                .iter()
                .filter_map(|f| model.latest(f).map(|v| (f.to_string(), v)))
                .collect();
            (name.to_string(), fields)
        })
        .collect()
}

/// Names of the project's models that the simulator did not register.
pub fn skipped_models<'a>(project: &'a Project, sim: &Simulator) -> Vec<&'a str> {
    let registered: Vec<&str> = sim.execution_order().collect();
    project
        .models
        .iter()
        .map(|m| m.name.as_str())
        .filter(|name| !registered.contains(name))
        .collect()
}

/// Every traced field as CSV, one row per sample, `t` first.
pub fn traces_csv(sim: &Simulator) -> CliResult<String> {
    if sim.t().retention() != Retention::Full {
        return Err(CliError::InvalidInput(
            "trace export needs `retention: full`".to_string(),
        ));
    }

    let mut header = vec!["t".to_string()];
    let mut columns: Vec<&[Real]> = vec![sim.t().values()];
    for (name, model) in sim.models() {
        for field in model.kind().fields() {
            if let Some(trace) = model.field_id(field).and_then(|id| model.trace(id)) {
                header.push(format!("{name}.{field}"));
                columns.push(trace.values());
            }
        }
    }

    let rows = columns.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut csv = header.join(",");
    csv.push('\n');
    for k in 0..rows {
        let row: Vec<String> = columns
            .iter()
            .map(|c| c.get(k).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    Ok(csv)
}

/// Parse `model.param=value`. The parameter name is the part after the
/// last dot, so model names may contain dots.
pub fn parse_override(s: &str) -> CliResult<(String, String, Real)> {
    let invalid = || CliError::InvalidInput(format!("expected model.param=value, got '{s}'"));
    let (target, value) = s.split_once('=').ok_or_else(invalid)?;
    let (model, param) = target.trim().rsplit_once('.').ok_or_else(invalid)?;
    if model.is_empty() || param.is_empty() {
        return Err(invalid());
    }
    let value: Real = value
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidInput(format!("'{value}' is not a number in '{s}'")))?;
    Ok((model.to_string(), param.to_string(), value))
}
