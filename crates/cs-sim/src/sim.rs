//! Simulator: model registry, clock and the stepping loop.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cs_core::{Real, Retention, Trace};
use cs_models::{Model, ModelInstance, ModelKind, build_model};
use cs_project::{ModelSpec, Project, SimulationDef, TiePolicy};
use tracing::{debug, info, warn};

use crate::error::{SimError, SimResult};
use crate::graph::{Binding, ExecutionGraph, GraphEntry, InputSource, SimField, bind_entry};

/// Options for simulation runs.
#[derive(Clone, Debug)]
pub struct SimOptions {
    /// Cycle duration (seconds)
    pub dt: Real,
    /// Simulated span (seconds)
    pub duration: Real,
    /// History kept by every model trace and the clock
    pub retention: Retention,
    pub tie_policy: TiePolicy,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            duration: 1.0,
            retention: Retention::Full,
            tie_policy: TiePolicy::NewestFirst,
        }
    }
}

impl SimOptions {
    pub fn new(dt: Real, duration: Real) -> Self {
        Self {
            dt,
            duration,
            ..Self::default()
        }
    }

    /// Number of cycles a full run executes: `duration / dt`, truncated.
    pub fn cycle_count(&self) -> usize {
        (self.duration / self.dt).trunc() as usize
    }

    fn validate(&self) -> SimResult<()> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(SimError::InvalidArg {
                what: "dt must be positive and finite",
            });
        }
        if !(self.duration >= 0.0) || !self.duration.is_finite() {
            return Err(SimError::InvalidArg {
                what: "duration must be non-negative and finite",
            });
        }
        Ok(())
    }
}

impl From<&SimulationDef> for SimOptions {
    fn from(def: &SimulationDef) -> Self {
        Self {
            dt: def.dt,
            duration: def.duration,
            retention: def.retention,
            tie_policy: def.tie_policy,
        }
    }
}

/// Hook invoked after every completed cycle.
///
/// Observers get read-only access to the simulator; returning
/// `ControlFlow::Break` requests a stop that takes effect before the next
/// cycle.
pub trait CycleObserver {
    fn after_cycle(&mut self, sim: &Simulator) -> SimResult<ControlFlow<()>>;
}

impl<F> CycleObserver for F
where
    F: FnMut(&Simulator) -> SimResult<ControlFlow<()>>,
{
    fn after_cycle(&mut self, sim: &Simulator) -> SimResult<ControlFlow<()>> {
        self(sim)
    }
}

/// Cloneable handle requesting a cooperative stop from another thread.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        !self.0.load(Ordering::Acquire)
    }
}

/// Outcome of a call to [`Simulator::run`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    /// Cycles executed by this call.
    pub cycles: usize,
    /// True if the run ended on a stop request before the cycle count.
    pub stopped_early: bool,
    /// Simulated time after the last executed cycle.
    pub t_end: Real,
}

/// Discrete-time model orchestrator.
///
/// All state is owned by the instance, so independent simulators can run on
/// separate threads without interfering.
#[derive(Debug)]
pub struct Simulator {
    options: SimOptions,
    models: Vec<ModelInstance>,
    names: Vec<String>,
    index: HashMap<String, usize>,
    graph: ExecutionGraph,
    clock: Trace,
    cycle: usize,
    completed: usize,
    running: Arc<AtomicBool>,
    scratch: Vec<Real>,
}

impl Simulator {
    pub fn new(options: SimOptions) -> SimResult<Self> {
        options.validate()?;
        Ok(Self {
            clock: Trace::new(0.0, options.retention),
            graph: ExecutionGraph::new(options.tie_policy),
            options,
            models: Vec::new(),
            names: Vec::new(),
            index: HashMap::new(),
            cycle: 0,
            completed: 0,
            running: Arc::new(AtomicBool::new(true)),
            scratch: Vec::new(),
        })
    }

    /// Build a simulator and register every model of `project`.
    ///
    /// Specs that cannot be registered are skipped with a warning.
    pub fn from_project(project: &Project) -> SimResult<Self> {
        Self::from_specs((&project.simulation).into(), &project.models)
    }

    pub fn from_specs(options: SimOptions, specs: &[ModelSpec]) -> SimResult<Self> {
        let mut sim = Self::new(options)?;
        for spec in specs {
            sim.add_model(spec);
        }
        Ok(sim)
    }

    /// Register a model, logging and skipping specs that are disabled or
    /// cannot be instantiated. Returns whether the model was registered.
    pub fn add_model(&mut self, spec: &ModelSpec) -> bool {
        match self.try_add_model(spec) {
            Ok(true) => true,
            Ok(false) => {
                warn!(model = %spec.name, "model is disabled, skipping");
                false
            }
            Err(e) => {
                warn!(model = %spec.name, error = %e, "skipping model");
                false
            }
        }
    }

    /// Register a model. `Ok(false)` means the spec is disabled.
    pub fn try_add_model(&mut self, spec: &ModelSpec) -> SimResult<bool> {
        if !spec.enabled {
            return Ok(false);
        }
        let config = |what: String| SimError::Config {
            name: spec.name.clone(),
            what,
        };
        if self.index.contains_key(&spec.name) {
            return Err(config("a model with this name is already registered".to_string()));
        }
        let kind: ModelKind = spec.class.parse().map_err(|e| config(format!("{e}")))?;
        let model = build_model(kind, &spec.params, self.options.dt, self.options.retention)
            .map_err(|e| config(format!("{e}")))?;

        let slot = self.models.len();
        self.graph.insert(GraphEntry {
            name: spec.name.clone(),
            order: spec.order,
            inputs: spec.inputs.clone(),
            slot,
        })?;
        self.models.push(model);
        self.names.push(spec.name.clone());
        self.index.insert(spec.name.clone(), slot);
        debug!(model = %spec.name, %kind, order = spec.order, "registered");
        Ok(true)
    }

    /// Check every input reference without running.
    pub fn bind(&self) -> SimResult<Vec<Binding>> {
        self.graph.bind(&self.models, &self.index)
    }

    /// Current value of every input of the model `name`.
    pub fn resolve_inputs(&self, name: &str) -> SimResult<BTreeMap<String, Real>> {
        let entry = self.graph.entry(name).ok_or_else(|| SimError::UnknownModel {
            name: name.to_string(),
        })?;
        let binding = bind_entry(entry, &self.models, &self.index)?;
        let kind = self.models[entry.slot].kind();
        Ok(kind
            .inputs()
            .iter()
            .zip(&binding.sources)
            .map(|(input, source)| (input.to_string(), self.resolve(source)))
            .collect())
    }

    fn resolve(&self, source: &InputSource) -> Real {
        match *source {
            InputSource::Constant(v) | InputSource::Default(v) => v,
            InputSource::SimulatorField(field) => self.field(field),
            InputSource::ModelOutput { slot, field } => self.models[slot]
                .trace(field)
                .map(Trace::last)
                .unwrap_or(Real::NAN),
        }
    }

    /// Value of a simulator field.
    pub fn field(&self, field: SimField) -> Real {
        match field {
            SimField::Cycle => self.cycle as Real,
            SimField::Time => self.clock.last(),
            SimField::Dt => self.options.dt,
        }
    }

    /// Run every remaining cycle.
    pub fn run(&mut self) -> SimResult<RunSummary> {
        self.run_inner(None)
    }

    /// Run every remaining cycle, calling `observer` after each one.
    pub fn run_with_observer(&mut self, observer: &mut dyn CycleObserver) -> SimResult<RunSummary> {
        self.run_inner(Some(observer))
    }

    fn run_inner(
        &mut self,
        mut observer: Option<&mut dyn CycleObserver>,
    ) -> SimResult<RunSummary> {
        let bindings = self.bind()?;
        let total = self.options.cycle_count();
        let start = self.completed;
        info!(
            models = bindings.len(),
            from = start,
            cycles = total,
            dt = self.options.dt,
            "simulation started"
        );

        let mut stopped_early = false;
        for cycle in start..total {
            if !self.is_running() {
                stopped_early = true;
                break;
            }
            self.step_cycle(cycle, &bindings)?;
            if let Some(obs) = observer.as_deref_mut() {
                if obs.after_cycle(self)?.is_break() {
                    debug!(cycle, "observer requested stop");
                    self.stop_running();
                }
            }
        }
        if !stopped_early && self.completed < total {
            stopped_early = true;
        }

        let summary = RunSummary {
            cycles: self.completed - start,
            stopped_early,
            t_end: self.clock.last(),
        };
        info!(
            cycles = summary.cycles,
            t_end = summary.t_end,
            stopped_early,
            "simulation finished"
        );
        Ok(summary)
    }

    fn step_cycle(&mut self, cycle: usize, bindings: &[Binding]) -> SimResult<()> {
        self.cycle = cycle;
        let mut inputs = std::mem::take(&mut self.scratch);
        for binding in bindings {
            inputs.clear();
            inputs.extend(binding.sources.iter().map(|s| self.resolve(s)));
            if let Err(source) = self.models[binding.slot].calculate(&inputs) {
                self.scratch = inputs;
                return Err(SimError::Model {
                    name: self.names[binding.slot].clone(),
                    source,
                });
            }
        }
        self.scratch = inputs;
        self.clock.push(self.clock.last() + self.options.dt);
        self.completed = cycle + 1;
        Ok(())
    }

    /// Request a stop; the cycle in flight still completes.
    pub fn stop_running(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    /// Restore every model, the clock and the cycle counter to their state
    /// right after registration. A pending stop request is kept.
    pub fn reset(&mut self) {
        for model in &mut self.models {
            model.reset();
        }
        self.clock.reset();
        self.cycle = 0;
        self.completed = 0;
        debug!("simulator reset");
    }

    /// Retune a parameter of a registered model.
    pub fn set_param(&mut self, model: &str, name: &str, value: Real) -> SimResult<()> {
        let slot = self.slot(model)?;
        self.models[slot]
            .set_param(name, value)
            .map_err(|source| SimError::Model {
                name: model.to_string(),
                source,
            })
    }

    fn slot(&self, name: &str) -> SimResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownModel {
                name: name.to_string(),
            })
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn dt(&self) -> Real {
        self.options.dt
    }

    /// Elapsed-time history; one element per completed cycle plus the start.
    pub fn t(&self) -> &Trace {
        &self.clock
    }

    /// Elapsed simulated time.
    pub fn time(&self) -> Real {
        self.clock.last()
    }

    /// Index of the cycle executing (or last executed).
    pub fn current_cycle(&self) -> usize {
        self.cycle
    }

    pub fn cycles_completed(&self) -> usize {
        self.completed
    }

    pub fn cycle_count(&self) -> usize {
        self.options.cycle_count()
    }

    pub fn model(&self, name: &str) -> Option<&ModelInstance> {
        self.index.get(name).map(|&slot| &self.models[slot])
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut ModelInstance> {
        self.index.get(name).map(|&slot| &mut self.models[slot])
    }

    /// Registered models in registration order.
    pub fn models(&self) -> impl Iterator<Item = (&str, &ModelInstance)> {
        self.names.iter().map(String::as_str).zip(&self.models)
    }

    pub fn execution_order(&self) -> impl Iterator<Item = &str> {
        self.graph.names()
    }

    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    pub fn trace(&self, model: &str, field: &str) -> Option<&Trace> {
        let model = self.model(model)?;
        model.trace(model.field_id(field)?)
    }

    pub fn latest(&self, model: &str, field: &str) -> Option<Real> {
        self.trace(model, field).map(Trace::last)
    }
}
