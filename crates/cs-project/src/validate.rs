//! Project validation logic.
//!
//! Structural checks only; model parameters are decoded and checked when
//! the simulator registers each model.

use std::collections::HashSet;

use crate::schema::{LATEST_VERSION, ModelSpec, Project, SourceDef, TunerDef};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version == 0 || project.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    let sim = &project.simulation;
    if !(sim.dt > 0.0) || !sim.dt.is_finite() {
        return Err(invalid("simulation.dt", sim.dt, "must be positive and finite"));
    }
    if !(sim.duration >= 0.0) || !sim.duration.is_finite() {
        return Err(invalid(
            "simulation.duration",
            sim.duration,
            "must be non-negative and finite",
        ));
    }

    let mut names = HashSet::new();
    for spec in &project.models {
        if spec.name.trim().is_empty() {
            return Err(invalid("model name", &spec.name, "must not be empty"));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: spec.name.clone(),
                context: "models".to_string(),
            });
        }
    }
    for spec in &project.models {
        validate_inputs(spec, &names)?;
    }

    if let Some(meter) = &project.performance_meter {
        let mut seen = HashSet::new();
        for mea in &meter.measurements {
            if !seen.insert(mea.name.as_str()) {
                return Err(ValidationError::DuplicateName {
                    name: mea.name.clone(),
                    context: "performance_meter.measurements".to_string(),
                });
            }
        }
    }

    if let Some(tuner) = &project.tuner {
        validate_tuner(tuner, &names)?;
    }

    Ok(())
}

fn validate_inputs(spec: &ModelSpec, names: &HashSet<&str>) -> Result<(), ValidationError> {
    for (input, source) in &spec.inputs {
        match source {
            SourceDef::Model { model, .. } if !names.contains(model.as_str()) => {
                return Err(ValidationError::MissingReference {
                    name: model.clone(),
                    context: format!("model '{}' input '{}'", spec.name, input),
                });
            }
            SourceDef::Constant { value } if !value.is_finite() => {
                return Err(invalid(
                    &format!("{}.inputs.{}", spec.name, input),
                    value,
                    "constant must be finite",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_tuner(tuner: &TunerDef, names: &HashSet<&str>) -> Result<(), ValidationError> {
    if !names.contains(tuner.regulator.as_str()) {
        return Err(ValidationError::MissingReference {
            name: tuner.regulator.clone(),
            context: "tuner.regulator".to_string(),
        });
    }
    for (field, range) in [
        ("tuner.p_range", tuner.p_range),
        ("tuner.i_range", tuner.i_range),
        ("tuner.d_range", tuner.d_range),
    ] {
        if !(range[0] <= range[1]) {
            return Err(invalid(field, format!("{range:?}"), "lower bound exceeds upper bound"));
        }
    }
    if tuner.max_combinations == 0 {
        return Err(invalid("tuner.max_combinations", 0, "must be positive"));
    }
    if let Some(rec) = &tuner.recurring {
        if !(rec.divider > 0.0) {
            return Err(invalid("tuner.recurring.divider", rec.divider, "must be positive"));
        }
        if rec.max_loop_runs == 0 {
            return Err(invalid("tuner.recurring.max_loop_runs", 0, "must be positive"));
        }
    }
    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
