use std::collections::BTreeMap;

use cs_core::Retention;
use cs_project::schema::*;
use cs_project::{
    ProjectError, ValidationError, load_json, load_models_dir, load_yaml, save_json, save_yaml,
    validate_project,
};
use serde_json::json;

fn rc_pid_project() -> Project {
    let mut pid_inputs = BTreeMap::new();
    pid_inputs.insert(
        "SP".to_string(),
        SourceDef::Constant { value: 1.0 },
    );
    pid_inputs.insert(
        "PV".to_string(),
        SourceDef::Model {
            model: "rc".to_string(),
            variable: "Vc".to_string(),
        },
    );
    let mut rc_inputs = BTreeMap::new();
    rc_inputs.insert(
        "Vin".to_string(),
        SourceDef::Model {
            model: "pid".to_string(),
            variable: "MV".to_string(),
        },
    );

    Project {
        version: 1,
        name: "RC under PID".to_string(),
        simulation: SimulationDef {
            dt: 0.001,
            duration: 1.0,
            retention: Retention::Full,
            tie_policy: TiePolicy::NewestFirst,
        },
        models: vec![
            ModelSpec {
                name: "pid".to_string(),
                class: "PIDAntiWindup".to_string(),
                order: 0,
                enabled: true,
                params: json!({"Kp": 2.0, "Ti": 0.5, "Td": 0.0, "min_MV": -10.0, "max_MV": 10.0}),
                inputs: pid_inputs,
            },
            ModelSpec {
                name: "rc".to_string(),
                class: "RC".to_string(),
                order: 1,
                enabled: true,
                params: json!({"resistance": 1.0, "capacitance": 0.1}),
                inputs: rc_inputs,
            },
        ],
        performance_meter: None,
        tuner: None,
    }
}

#[test]
fn roundtrip_yaml() {
    let project = rc_pid_project();
    let path = std::env::temp_dir().join("cs_project_roundtrip.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();
    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_json() {
    let project = rc_pid_project();
    let path = std::env::temp_dir().join("cs_project_roundtrip.json");
    save_json(&path, &project).unwrap();
    let loaded = load_json(&path).unwrap();
    assert_eq!(project, loaded);
}

#[test]
fn duplicate_model_names_are_rejected() {
    let mut project = rc_pid_project();
    project.models[1].name = "pid".to_string();
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::DuplicateName { .. })
    ));
}

#[test]
fn dangling_model_reference_is_rejected() {
    let mut project = rc_pid_project();
    project.models[0].inputs.insert(
        "FWD".to_string(),
        SourceDef::Model {
            model: "ghost".to_string(),
            variable: "value".to_string(),
        },
    );
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::MissingReference { .. })
    ));
}

#[test]
fn non_positive_dt_is_rejected() {
    let mut project = rc_pid_project();
    project.simulation.dt = 0.0;
    assert!(validate_project(&project).is_err());
    project.simulation.dt = 0.001;
    project.simulation.duration = -1.0;
    assert!(validate_project(&project).is_err());
}

#[test]
fn future_version_is_rejected() {
    let mut project = rc_pid_project();
    project.version = LATEST_VERSION + 1;
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::UnsupportedVersion { .. })
    ));
}

#[test]
fn inverted_tuner_range_is_rejected() {
    let mut project = rc_pid_project();
    project.tuner = Some(TunerDef {
        regulator: "pid".to_string(),
        p_range: [5.0, 1.0],
        i_range: [0.1, 1.0],
        d_range: [0.0, 0.0],
        p_steps: None,
        i_steps: None,
        d_steps: None,
        steps: Some(3),
        max_combinations: 1000,
        cost: CostDef {
            overshoot: OvershootCostDef {
                name: "overshoot".to_string(),
                weight: 1.0,
            },
            settling_time: SettlingCostDef {
                name: "settling".to_string(),
                weight: 1.0,
                not_settled_penalty: 100.0,
            },
        },
        recurring: None,
    });
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::InvalidValue { .. })
    ));
}

#[test]
fn unknown_extension_is_rejected() {
    let err = cs_project::load(std::path::Path::new("project.toml")).unwrap_err();
    assert!(matches!(err, ProjectError::UnsupportedFormat { .. }));
}

#[test]
fn models_dir_is_read_in_name_order() {
    let dir = std::env::temp_dir().join("cs_project_models_dir");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("b_rc.json"),
        r#"{"name": "rc", "class": "RC", "order": 1, "params": {"resistance": 1.0, "capacitance": 1.0}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("a_sig.yaml"),
        "name: sig\nclass: SignalGenerator\nparams:\n  events: [{start: {value: 1.0}}]\n",
    )
    .unwrap();
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let specs = load_models_dir(&dir).unwrap();
    let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["sig", "rc"]);
}

#[test]
fn missing_models_dir_yields_nothing() {
    let dir = std::env::temp_dir().join("cs_project_does_not_exist");
    assert!(load_models_dir(&dir).unwrap().is_empty());
}
