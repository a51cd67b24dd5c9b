//! Execution order and typed input addressing.
//!
//! The graph keeps one entry per registered model, sorted ascending by
//! `order`. Before a run, [`ExecutionGraph::bind`] turns every entry's
//! declarative input map into positional [`InputSource`]s checked against
//! the field registry of each model kind, so a bad reference fails before
//! the first cycle.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use cs_core::Real;
use cs_models::{FieldId, Model, ModelInstance};
use cs_project::{SourceDef, TiePolicy};
use tracing::debug;

use crate::error::{SimError, SimResult};

/// Fields the simulator itself exposes to `variable` sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimField {
    /// Index of the cycle being executed.
    Cycle,
    /// Elapsed simulated time at the start of the cycle.
    Time,
    Dt,
}

impl SimField {
    pub fn name(self) -> &'static str {
        match self {
            SimField::Cycle => "current_cycle",
            SimField::Time => "t",
            SimField::Dt => "dt",
        }
    }
}

impl fmt::Display for SimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimField {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current_cycle" | "cycle" => Ok(SimField::Cycle),
            "t" | "time" => Ok(SimField::Time),
            "dt" => Ok(SimField::Dt),
            other => Err(SimError::wiring(format!("simulator has no field '{other}'"))),
        }
    }
}

/// Resolved origin of one model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSource {
    Constant(Real),
    SimulatorField(SimField),
    /// Latest value of `field` on the model registered in `slot`.
    ModelOutput { slot: usize, field: FieldId },
    /// Unwired optional input, filled with the kind's default.
    Default(Real),
}

/// One registered model awaiting execution.
#[derive(Debug, Clone)]
pub struct GraphEntry {
    pub name: String,
    pub order: i64,
    pub inputs: BTreeMap<String, SourceDef>,
    /// Position of the model in the simulator's registry.
    pub slot: usize,
}

/// A graph entry with its inputs resolved to positional sources.
#[derive(Debug, Clone)]
pub struct Binding {
    pub slot: usize,
    /// One source per declared input of the model's kind, in input order.
    pub sources: Vec<InputSource>,
}

/// Ordered list of models to execute each cycle.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    entries: Vec<GraphEntry>,
    policy: TiePolicy,
}

impl ExecutionGraph {
    pub fn new(policy: TiePolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> TiePolicy {
        self.policy
    }

    /// Insert `entry` before the first entry whose order is greater than or
    /// equal to its own, so among equal orders the newest runs first.
    pub fn insert(&mut self, entry: GraphEntry) -> SimResult<()> {
        if self.policy == TiePolicy::Reject {
            if let Some(other) = self.entries.iter().find(|e| e.order == entry.order) {
                return Err(SimError::Config {
                    name: entry.name,
                    what: format!("order {} is already used by '{}'", other.order, other.name),
                });
            }
        }
        let at = self
            .entries
            .iter()
            .position(|e| e.order >= entry.order)
            .unwrap_or(self.entries.len());
        debug!(model = %entry.name, order = entry.order, position = at, "scheduled");
        self.entries.insert(at, entry);
        Ok(())
    }

    pub fn entries(&self) -> &[GraphEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&GraphEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Model names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind every entry, in execution order.
    pub fn bind(
        &self,
        models: &[ModelInstance],
        index: &HashMap<String, usize>,
    ) -> SimResult<Vec<Binding>> {
        self.entries
            .iter()
            .map(|entry| bind_entry(entry, models, index))
            .collect()
    }
}

/// Resolve one entry's declarative inputs against the registry.
pub fn bind_entry(
    entry: &GraphEntry,
    models: &[ModelInstance],
    index: &HashMap<String, usize>,
) -> SimResult<Binding> {
    let model = &models[entry.slot];
    let kind = model.kind();
    let mut sources: Vec<Option<InputSource>> = vec![None; kind.inputs().len()];

    for (input, def) in &entry.inputs {
        let Some(at) = kind.input_index(input) else {
            return Err(SimError::wiring(format!(
                "model '{}' ({kind}) has no input '{input}'",
                entry.name
            )));
        };
        let source = match def {
            SourceDef::Constant { value } => InputSource::Constant(*value),
            SourceDef::Simulator { variable } => InputSource::SimulatorField(variable.parse()?),
            SourceDef::Model { model, variable } => {
                let Some(&slot) = index.get(model) else {
                    return Err(SimError::wiring(format!(
                        "input '{input}' of '{}' references unknown model '{model}'",
                        entry.name
                    )));
                };
                let source_kind = models[slot].kind();
                let Some(field) = source_kind.field_id(variable) else {
                    return Err(SimError::wiring(format!(
                        "input '{input}' of '{}' references '{model}.{variable}', \
                         but {source_kind} has no field '{variable}'",
                        entry.name
                    )));
                };
                InputSource::ModelOutput { slot, field }
            }
        };
        sources[at] = Some(source);
    }

    let sources = sources
        .into_iter()
        .enumerate()
        .map(|(at, source)| match source {
            Some(source) => Ok(source),
            None => model.input_default(at).map(InputSource::Default).ok_or_else(|| {
                SimError::wiring(format!(
                    "model '{}' ({kind}) requires input '{}'",
                    entry.name,
                    kind.inputs()[at]
                ))
            }),
        })
        .collect::<SimResult<Vec<_>>>()?;

    Ok(Binding {
        slot: entry.slot,
        sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, order: i64) -> GraphEntry {
        GraphEntry {
            name: name.to_string(),
            order,
            inputs: BTreeMap::new(),
            slot: 0,
        }
    }

    #[test]
    fn newest_equal_order_runs_first() {
        let mut graph = ExecutionGraph::new(TiePolicy::NewestFirst);
        graph.insert(entry("spec1", 2)).unwrap();
        graph.insert(entry("spec2", 1)).unwrap();
        graph.insert(entry("spec3", 1)).unwrap();
        let order: Vec<&str> = graph.names().collect();
        assert_eq!(order, ["spec3", "spec2", "spec1"]);
    }

    #[test]
    fn higher_order_appends() {
        let mut graph = ExecutionGraph::default();
        graph.insert(entry("a", -1)).unwrap();
        graph.insert(entry("b", 5)).unwrap();
        graph.insert(entry("c", 3)).unwrap();
        let order: Vec<&str> = graph.names().collect();
        assert_eq!(order, ["a", "c", "b"]);
    }

    #[test]
    fn reject_policy_refuses_ties() {
        let mut graph = ExecutionGraph::new(TiePolicy::Reject);
        graph.insert(entry("a", 1)).unwrap();
        let err = graph.insert(entry("b", 1)).unwrap_err();
        assert!(matches!(err, SimError::Config { ref name, .. } if name == "b"));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn simulator_field_aliases() {
        assert_eq!("cycle".parse::<SimField>().unwrap(), SimField::Cycle);
        assert_eq!("current_cycle".parse::<SimField>().unwrap(), SimField::Cycle);
        assert_eq!("time".parse::<SimField>().unwrap(), SimField::Time);
        assert!("clock".parse::<SimField>().is_err());
    }
}
