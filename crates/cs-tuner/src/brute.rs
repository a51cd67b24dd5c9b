//! Brute-force PID grid search.

use cs_core::{Real, Retention};
use cs_metrics::{MeasurementKind, PerformanceMeter};
use cs_models::ModelKind;
use cs_project::{PerformanceMeterDef, Project, RecurringDef, TunerDef};
use cs_sim::{SimOptions, Simulator};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{TunerError, TunerResult};
use crate::grid::{Gains, SearchRanges, StepCounts, grid};

/// A completed trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trial {
    pub gains: Gains,
    pub cost: Real,
}

/// Result of one pass over the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundOutcome {
    pub ranges: SearchRanges,
    pub steps: StepCounts,
    /// Completed trials, in grid order.
    pub trials: Vec<Trial>,
    /// Trials whose simulation failed.
    pub failed: usize,
    /// Lowest cost; the earliest in grid order wins ties.
    pub best: Trial,
}

/// Runs one independent simulation per grid point and keeps the cheapest.
///
/// Each trial builds its own [`Simulator`] from the project, so trials share
/// nothing and may run on any thread.
#[derive(Debug, Clone)]
pub struct BruteTuner {
    project: Project,
    def: TunerDef,
    meter: PerformanceMeterDef,
    ranges: SearchRanges,
    steps: StepCounts,
    parallel: bool,
}

impl BruteTuner {
    /// Check that `project` can be tuned: a tuner section, an enabled
    /// performance meter holding the cost measurements, and a PID regulator.
    pub fn new(project: &Project) -> TunerResult<Self> {
        let config = |what: String| TunerError::Config { what };

        let def = project
            .tuner
            .clone()
            .ok_or_else(|| config("project has no tuner section".to_string()))?;
        let meter = project
            .performance_meter
            .clone()
            .filter(|m| m.enabled)
            .ok_or_else(|| config("the performance meter must be enabled".to_string()))?;

        let regulator = project
            .models
            .iter()
            .find(|m| m.name == def.regulator && m.enabled)
            .ok_or_else(|| config(format!("no enabled model named '{}'", def.regulator)))?;
        let kind: ModelKind = regulator
            .class
            .parse()
            .map_err(|e| config(format!("regulator '{}': {e}", def.regulator)))?;
        if !kind.is_pid() {
            return Err(config(format!(
                "regulator '{}' is a {kind}, not a PID",
                def.regulator
            )));
        }

        require_measurement(&meter, &def.cost.overshoot.name, MeasurementKind::Overshoot)?;
        require_measurement(
            &meter,
            &def.cost.settling_time.name,
            MeasurementKind::SettlingTime,
        )?;

        Ok(Self {
            ranges: SearchRanges::from_def(&def),
            steps: StepCounts::resolve(&def),
            project: project.clone(),
            def,
            meter,
            parallel: true,
        })
    }

    /// Run trials on the rayon pool (default) or one after another.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn def(&self) -> &TunerDef {
        &self.def
    }

    pub fn ranges(&self) -> SearchRanges {
        self.ranges
    }

    pub fn set_ranges(&mut self, ranges: SearchRanges) {
        self.ranges = ranges;
    }

    pub fn steps(&self) -> StepCounts {
        self.steps
    }

    /// Simulate one gain set and score it.
    pub fn run_trial(&self, gains: Gains) -> TunerResult<Real> {
        let options = SimOptions {
            retention: Retention::Window,
            ..SimOptions::from(&self.project.simulation)
        };
        let mut sim = Simulator::from_specs(options, &self.project.models)?;
        let regulator = &self.def.regulator;
        sim.set_param(regulator, "Kp", gains.kp)?;
        sim.set_param(regulator, "Ti", gains.ti)?;
        sim.set_param(regulator, "Td", gains.td)?;

        let mut meter = PerformanceMeter::new(&self.meter, &sim)?;
        sim.run_with_observer(&mut meter)?;
        let cost = self.cost(&meter)?;
        if !cost.is_finite() {
            return Err(TunerError::Config {
                what: format!("cost evaluated to {cost}"),
            });
        }
        Ok(cost)
    }

    /// `overshoot.max * w_o + (settle_time * w_s if settled, else the penalty)`
    pub fn cost(&self, meter: &PerformanceMeter) -> TunerResult<Real> {
        let cost = &self.def.cost;
        let missing = |name: &str| TunerError::MissingMeasurement {
            name: name.to_string(),
        };
        let overshoot = meter
            .overshoot(&cost.overshoot.name)
            .ok_or_else(|| missing(&cost.overshoot.name))?;
        let settling = meter
            .settling_time(&cost.settling_time.name)
            .ok_or_else(|| missing(&cost.settling_time.name))?;

        let settling_cost = match settling.settle_time() {
            Some(t) if settling.settled() => t * cost.settling_time.weight,
            _ => cost.settling_time.not_settled_penalty,
        };
        Ok(overshoot.max() * cost.overshoot.weight + settling_cost)
    }

    /// One pass over the current ranges.
    pub fn run(&self) -> TunerResult<RoundOutcome> {
        let points = grid(&self.ranges, &self.steps);
        info!(
            combinations = points.len(),
            parallel = self.parallel,
            "starting tuning round"
        );

        let evaluate = |gains: &Gains| (*gains, self.run_trial(*gains));
        let results: Vec<(Gains, TunerResult<Real>)> = if self.parallel {
            points.par_iter().map(evaluate).collect()
        } else {
            points.iter().map(evaluate).collect()
        };

        let mut trials = Vec::with_capacity(results.len());
        let mut failed = 0;
        for (gains, result) in results {
            match result {
                Ok(cost) => {
                    debug!(kp = gains.kp, ti = gains.ti, td = gains.td, cost, "trial done");
                    trials.push(Trial { gains, cost });
                }
                Err(e) => {
                    warn!(kp = gains.kp, ti = gains.ti, td = gains.td, error = %e, "trial failed");
                    failed += 1;
                }
            }
        }

        let best = trials
            .iter()
            .copied()
            .min_by(|a, b| a.cost.total_cmp(&b.cost))
            .ok_or(TunerError::NoResult {
                attempted: points.len(),
            })?;
        info!(
            cost = best.cost,
            kp = best.gains.kp,
            ti = best.gains.ti,
            td = best.gains.td,
            failed,
            "tuning round finished"
        );

        Ok(RoundOutcome {
            ranges: self.ranges,
            steps: self.steps,
            trials,
            failed,
            best,
        })
    }
}

fn require_measurement(
    meter: &PerformanceMeterDef,
    name: &str,
    kind: MeasurementKind,
) -> TunerResult<()> {
    let found = meter
        .measurements
        .iter()
        .any(|m| m.name == name && m.class.parse::<MeasurementKind>().ok() == Some(kind));
    if found {
        Ok(())
    } else {
        Err(TunerError::MissingMeasurement {
            name: name.to_string(),
        })
    }
}

/// Outcome of a zooming search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringOutcome {
    /// Cheapest trial over all rounds.
    pub best: Trial,
    pub rounds: Vec<RoundOutcome>,
}

/// Repeats the grid search, narrowing the ranges around the best point
/// after every round.
///
/// Stops when a round improves on the best cost so far by no more than
/// `threshold` (relative), or after `max_loop_runs` rounds.
#[derive(Debug, Clone)]
pub struct RecurringBruteTuner {
    brute: BruteTuner,
    recurring: RecurringDef,
}

impl RecurringBruteTuner {
    pub fn new(project: &Project) -> TunerResult<Self> {
        let brute = BruteTuner::new(project)?;
        let recurring = brute.def.recurring.clone().ok_or_else(|| TunerError::Config {
            what: "tuner has no recurring section".to_string(),
        })?;
        Ok(Self { brute, recurring })
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.brute = self.brute.with_parallel(parallel);
        self
    }

    pub fn run(&self) -> TunerResult<RecurringOutcome> {
        let mut tuner = self.brute.clone();
        let first = tuner.run()?;
        let mut best = first.best;
        let mut rounds = vec![first];

        while rounds.len() < self.recurring.max_loop_runs {
            tuner.set_ranges(tuner.ranges().zoom(best.gains, self.recurring.divider));
            let round = match tuner.run() {
                Ok(round) => round,
                Err(TunerError::NoResult { attempted }) => {
                    warn!(attempted, "zoomed round produced no result, stopping");
                    break;
                }
                Err(e) => return Err(e),
            };

            let improvement = if best.cost != 0.0 {
                (best.cost - round.best.cost) / best.cost
            } else {
                0.0
            };
            if round.best.cost < best.cost {
                best = round.best;
            }
            info!(
                round = rounds.len() + 1,
                cost = round.best.cost,
                improvement,
                "recurring round finished"
            );
            rounds.push(round);
            if improvement <= self.recurring.threshold {
                break;
            }
        }

        Ok(RecurringOutcome { best, rounds })
    }
}
