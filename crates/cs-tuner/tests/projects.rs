use std::path::PathBuf;

use cs_metrics::PerformanceMeter;
use cs_sim::Simulator;

fn projects_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join("projects")
}

#[test]
fn demo_projects_load_and_run() {
    for name in ["rc_pid.yaml", "motor_pid.yaml"] {
        let path = projects_dir().join(name);
        let project = cs_project::load_yaml(&path)
            .unwrap_or_else(|e| panic!("{} failed to load: {e}", path.display()));

        let mut sim = Simulator::from_project(&project).unwrap();
        assert_eq!(sim.models().count(), project.models.len(), "{name}");
        sim.bind().unwrap();

        let meter_def = project.performance_meter.as_ref().unwrap();
        let mut meter = PerformanceMeter::new(meter_def, &sim).unwrap();
        let summary = sim.run_with_observer(&mut meter).unwrap();
        assert_eq!(summary.cycles, sim.cycle_count(), "{name}");
        assert!(meter.overshoot("overshoot").unwrap().max() > 0.0, "{name}");
    }
}

#[test]
fn rc_demo_tracks_its_setpoint() {
    let project = cs_project::load_yaml(&projects_dir().join("rc_pid.yaml")).unwrap();
    let mut sim = Simulator::from_project(&project).unwrap();
    sim.run().unwrap();
    let vc = sim.latest("rc", "Vc").unwrap();
    assert!((vc - 1.0).abs() < 0.05, "Vc = {vc}");
}

#[test]
fn motor_demo_spins_towards_setpoint() {
    let project = cs_project::load_yaml(&projects_dir().join("motor_pid.yaml")).unwrap();
    let mut sim = Simulator::from_project(&project).unwrap();
    sim.run().unwrap();
    let w = sim.latest("motor", "w").unwrap();
    assert!(w.is_finite() && w > 0.0, "w = {w}");
}
