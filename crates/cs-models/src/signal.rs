//! Scripted setpoint driver.

use cs_core::{Real, Retention, Trace};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::{FieldId, Model, ModelKind};

/// One scripted event.
///
/// Serialized externally tagged, e.g. `{"ramp_up": {"cycle": 200, "value": 0.01}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Initial value, consumed at construction.
    Start { value: Real },
    /// Jump to an absolute value.
    Step { cycle: u64, value: Real },
    /// Add `value` every cycle.
    RampUp { cycle: u64, value: Real },
    /// Subtract `value` every cycle.
    RampDown { cycle: u64, value: Real },
    /// Hold the previous value.
    Pause { cycle: u64 },
}

impl Event {
    /// Cycle at which the event activates; `None` for `Start`.
    pub fn cycle(&self) -> Option<u64> {
        match self {
            Event::Start { .. } => None,
            Event::Step { cycle, .. }
            | Event::RampUp { cycle, .. }
            | Event::RampDown { cycle, .. }
            | Event::Pause { cycle } => Some(*cycle),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalGeneratorParams {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Produces a value per cycle from an ordered list of events.
///
/// The event activating at a cycle stays current until a later one
/// activates. With no current event the previous value is held.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    events: Vec<Event>,
    current: Option<usize>,
    value: Trace,
}

impl SignalGenerator {
    pub fn new(events: Vec<Event>, retention: Retention) -> Self {
        let initial = events
            .iter()
            .filter_map(|e| match e {
                Event::Start { value } => Some(*value),
                _ => None,
            })
            .last()
            .unwrap_or(0.0);
        Self {
            events,
            current: None,
            value: Trace::new(initial, retention),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Event currently driving the output.
    pub fn current_event(&self) -> Option<&Event> {
        self.current.map(|idx| &self.events[idx])
    }

    pub fn value(&self) -> &Trace {
        &self.value
    }

    /// Produce the value for `cycle` and append it.
    pub fn step(&mut self, cycle: u64) -> Real {
        if cycle == 0 {
            let initial = self.value.initial();
            self.value.push(initial);
            return initial;
        }
        if let Some(idx) = self.events.iter().position(|e| e.cycle() == Some(cycle)) {
            self.current = Some(idx);
        }
        let last = self.value.last();
        let next = match self.current_event() {
            Some(Event::Step { value, .. }) => *value,
            Some(Event::RampUp { value, .. }) => last + value,
            Some(Event::RampDown { value, .. }) => last - value,
            Some(Event::Pause { .. }) | Some(Event::Start { .. }) | None => last,
        };
        self.value.push(next);
        next
    }
}

impl Model for SignalGenerator {
    fn kind(&self) -> ModelKind {
        ModelKind::SignalGenerator
    }

    fn calculate(&mut self, inputs: &[Real]) -> ModelResult<Real> {
        let cycle = inputs[0];
        if !(cycle >= 0.0) || cycle.fract() != 0.0 {
            return Err(ModelError::InvalidInput {
                what: format!("signal generator cycle must be a non-negative integer, got {cycle}"),
            });
        }
        Ok(self.step(cycle as u64))
    }

    fn reset(&mut self) {
        self.value.reset();
        self.current = None;
    }

    fn trace(&self, field: FieldId) -> Option<&Trace> {
        (field.index() == 0).then_some(&self.value)
    }

    fn input_default(&self, _input: usize) -> Option<Real> {
        None
    }

    fn set_param(&mut self, name: &str, _value: Real) -> ModelResult<()> {
        Err(ModelError::UnknownParam {
            kind: self.kind(),
            name: name.to_string(),
        })
    }
}
