mod error;
mod report;

use clap::{Parser, Subcommand};
use cs_ident::{Dataset, FirstOrderFitter, SecondOrderFitter};
use cs_metrics::{MeasurementReport, PerformanceMeter};
use cs_sim::Simulator;
use cs_tuner::{BruteTuner, RecurringBruteTuner, Trial};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::{CliError, CliResult};
use crate::report::{RunReport, parse_override, skipped_models, traces_csv};

#[derive(Parser)]
#[command(name = "cyclesim")]
#[command(about = "cyclesim - discrete-time control loop simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file and its input wiring
    Validate {
        /// Path to the project file (.yaml, .yml or .json)
        project_path: PathBuf,
    },
    /// Run a simulation
    Run {
        /// Path to the project file
        project_path: PathBuf,
        /// Override a model parameter before the run (model.param=value)
        #[arg(long = "set", value_name = "MODEL.PARAM=VALUE")]
        overrides: Vec<String>,
        /// Write a JSON run report
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write every trace as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Grid-search the gains of the project's PID regulator
    Tune {
        /// Path to the project file
        project_path: PathBuf,
        /// Zoom in around the best point over several rounds
        #[arg(long)]
        recurring: bool,
        /// Run trials one after another instead of in parallel
        #[arg(long)]
        sequential: bool,
        /// Write the tuning outcome as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fit a transfer function to recorded (u, y) or (t, u, y) samples
    Fit {
        /// CSV file with the samples
        data_path: PathBuf,
        /// Model order
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        order: u8,
        /// Sample period for two-column data (seconds)
        #[arg(long)]
        dt: Option<f64>,
    },
}

fn main() -> CliResult<()> {
    // RUST_LOG wins; info otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Run {
            project_path,
            overrides,
            output,
            csv,
        } => cmd_run(&project_path, &overrides, output.as_deref(), csv.as_deref()),
        Commands::Tune {
            project_path,
            recurring,
            sequential,
            output,
        } => cmd_tune(&project_path, recurring, !sequential, output.as_deref()),
        Commands::Fit {
            data_path,
            order,
            dt,
        } => cmd_fit(&data_path, order, dt),
    }
}

fn cmd_validate(project_path: &Path) -> CliResult<()> {
    info!(path = %project_path.display(), "validating project");
    println!("Validating project: {}", project_path.display());
    let project = cs_project::load(project_path)?;
    let sim = Simulator::from_project(&project)?;
    sim.bind()?;

    let order: Vec<&str> = sim.execution_order().collect();
    for name in skipped_models(&project, &sim) {
        warn!(model = %name, "model skipped (disabled or invalid)");
    }
    println!("  Execution order: {}", order.join(" -> "));
    println!("  Cycles: {}", sim.cycle_count());
    println!("✓ Project is valid");
    Ok(())
}

fn cmd_run(
    project_path: &Path,
    overrides: &[String],
    output: Option<&Path>,
    csv: Option<&Path>,
) -> CliResult<()> {
    info!(path = %project_path.display(), "loading project");
    let project = cs_project::load(project_path)?;
    let mut sim = Simulator::from_project(&project)?;
    for raw in overrides {
        let (model, param, value) = parse_override(raw)?;
        sim.set_param(&model, &param, value)?;
        info!(%model, %param, value, "parameter override");
    }

    println!("Running '{}' for {} cycles", project.name, sim.cycle_count());
    let mut meter = match &project.performance_meter {
        Some(def) if def.enabled => Some(PerformanceMeter::new(def, &sim)?),
        _ => None,
    };
    let summary = match meter.as_mut() {
        Some(meter) => sim.run_with_observer(meter)?,
        None => sim.run()?,
    };
    println!(
        "✓ Simulation completed: {} cycles, t = {:.3} s",
        summary.cycles, summary.t_end
    );

    let report = RunReport::new(&project.name, &sim, &summary, meter.as_ref());
    println!("\nFinal values:");
    for (model, fields) in &report.final_values {
        let values: Vec<String> = fields.iter().map(|(f, v)| format!("{f}={v:.6}")).collect();
        println!("  {model}: {}", values.join("  "));
    }
    if !report.measurements.is_empty() {
        println!("\nMeasurements:");
        for m in &report.measurements {
            print_measurement(m);
        }
    }

    if let Some(path) = output {
        write_file(path, serde_json::to_string_pretty(&report)?)?;
        println!("✓ Report written to {}", path.display());
    }
    if let Some(path) = csv {
        write_file(path, traces_csv(&sim)?)?;
        println!("✓ Traces written to {}", path.display());
    }
    Ok(())
}

fn print_measurement(m: &MeasurementReport) {
    match m {
        MeasurementReport::Overshoot { name, max } => {
            println!("  {name}: max Y/SP = {max:.4}");
        }
        MeasurementReport::SettlingTime {
            name,
            settled,
            settle_time,
        } => match (settled, settle_time) {
            (true, Some(t)) => println!("  {name}: settled at {t:.3} s"),
            _ => println!("  {name}: not settled"),
        },
    }
}

fn cmd_tune(
    project_path: &Path,
    recurring: bool,
    parallel: bool,
    output: Option<&Path>,
) -> CliResult<()> {
    info!(path = %project_path.display(), recurring, parallel, "tuning project");
    let project = cs_project::load(project_path)?;

    let (best, json) = if recurring {
        let tuner = RecurringBruteTuner::new(&project)?.with_parallel(parallel);
        let outcome = tuner.run()?;
        println!("✓ Recurring search finished after {} rounds", outcome.rounds.len());
        (outcome.best, serde_json::to_string_pretty(&outcome)?)
    } else {
        let tuner = BruteTuner::new(&project)?.with_parallel(parallel);
        let steps = tuner.steps();
        println!(
            "Searching {} x {} x {} gain combinations",
            steps.p, steps.i, steps.d
        );
        let outcome = tuner.run()?;
        if outcome.failed > 0 {
            println!("  {} trials failed and were skipped", outcome.failed);
        }
        (outcome.best, serde_json::to_string_pretty(&outcome)?)
    };
    print_best(&best);

    if let Some(path) = output {
        write_file(path, json)?;
        println!("✓ Outcome written to {}", path.display());
    }
    Ok(())
}

fn print_best(best: &Trial) {
    println!("\nBest cost = {:.6}", best.cost);
    println!("  Kp = {}", best.gains.kp);
    println!("  Ti = {}", best.gains.ti);
    println!("  Td = {}", best.gains.td);
}

fn cmd_fit(data_path: &Path, order: u8, dt: Option<f64>) -> CliResult<()> {
    let text = std::fs::read_to_string(data_path).map_err(|source| CliError::Read {
        path: data_path.to_path_buf(),
        source,
    })?;
    info!(path = %data_path.display(), order, "fitting samples");
    let rows = cs_ident::parse_csv(&text)?;
    let data = Dataset::from_rows(&rows, dt)?;
    println!("Fitting order {order} model to {} samples", data.len());

    match order {
        1 => {
            let fit = FirstOrderFitter::new().fit(&data)?;
            println!("  K   = {:.6}", fit.gain);
            println!("  tau = {:.6} s", fit.tau);
            println!("  rms = {:.3e}", fit.residual_rms);
        }
        _ => {
            let fit = SecondOrderFitter::new().fit(&data)?;
            println!("  K    = {:.6}", fit.gain);
            println!("  zeta = {:.6}", fit.damping);
            println!("  w    = {:.6} rad/s", fit.natural_frequency);
            println!("  rms  = {:.3e}", fit.residual_rms);
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: String) -> CliResult<()> {
    std::fs::write(path, contents).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}
