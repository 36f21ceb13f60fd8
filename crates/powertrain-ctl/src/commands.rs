//! Command implementations.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};
use powertrain_core::{
    DEFAULT_SWEEP_RPM_STEP, DEFAULT_SWEEP_THROTTLES, Engine, Noise, torque_curve_sweep,
};
use powertrain_sim::{
    JsonLinesSink, PointLayout, Simulation, SimulationConfig, TelemetryPoint, TelemetrySink,
    TracingSink,
};
use tracing::{debug, info, warn};

use crate::error::CliError;
use crate::output;

/// Smallest `--rpm-step` accepted by `torque-curve`.
pub const MIN_RPM_STEP: f64 = 1.0;

/// Where per-tick telemetry goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TelemetryOutput {
    /// One JSON point per line on stdout
    JsonLines,
    /// `debug` log events
    Log,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Simulation config file (.json, .yaml or .yml)
    #[arg(short, long, env = "POWERTRAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed for the noise source; omit for a random run
    #[arg(long, env = "POWERTRAIN_SEED")]
    pub seed: Option<u64>,

    /// Stop after this many driving ticks; runs until Ctrl+C when omitted
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Tire specification, e.g. 245/40R19
    #[arg(long)]
    pub tire: Option<String>,

    /// Gear engaged after warm-up
    #[arg(long)]
    pub gear: Option<u8>,

    /// Value of the `simulation` tag on every point
    #[arg(long, env = "POWERTRAIN_SIMULATION_ID")]
    pub simulation_id: Option<String>,

    /// Constant slip ratio fed to the differential
    #[arg(long, allow_negative_numbers = true)]
    pub slip: Option<f64>,

    /// Disable the accelerator sweep
    #[arg(long)]
    pub no_sweep: bool,

    /// Disable automatic gear shifting
    #[arg(long)]
    pub no_shift: bool,

    /// Telemetry destination
    #[arg(long, value_enum, default_value_t = TelemetryOutput::JsonLines)]
    pub output: TelemetryOutput,

    /// Point layout per tick: combined or per-component
    #[arg(long)]
    pub layout: Option<PointLayout>,
}

impl RunArgs {
    /// Layer the command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut SimulationConfig) {
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(ticks) = self.ticks {
            config.max_ticks = Some(ticks);
        }
        if let Some(tire) = &self.tire {
            config.powertrain.tire_spec.clone_from(tire);
        }
        if let Some(gear) = self.gear {
            config.initial_gear = gear;
        }
        if let Some(id) = &self.simulation_id {
            config.simulation_id.clone_from(id);
        }
        if let Some(slip) = self.slip {
            config.slip_ratio = slip;
        }
        if self.no_sweep {
            config.accelerator.enabled = false;
        }
        if self.no_shift {
            config.gear_shift.enabled = false;
        }
        if let Some(layout) = self.layout {
            config.point_layout = layout;
        }
    }
}

#[derive(Debug, Args)]
pub struct TorqueCurveArgs {
    /// Simulation config file supplying the engine parameters
    #[arg(short, long, env = "POWERTRAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Throttle positions to sweep, comma separated
    #[arg(long = "throttle", value_delimiter = ',')]
    pub throttles: Vec<f64>,

    /// RPM increment between samples, at least 1
    #[arg(long, default_value_t = DEFAULT_SWEEP_RPM_STEP)]
    pub rpm_step: f64,

    /// Seed for the torque noise
    #[arg(long, env = "POWERTRAIN_SEED")]
    pub seed: Option<u64>,

    /// Sample the curve without torque noise
    #[arg(long)]
    pub noiseless: bool,
}

pub fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => {
            let config = SimulationConfig::from_path(path)
                .map_err(CliError::from)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            info!(path = %path.display(), "Loaded simulation config");
            Ok(config)
        }
        None => Ok(SimulationConfig::default()),
    }
}

pub async fn run(args: &RunArgs, json: bool) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);

    let simulation = Simulation::new(config)
        .map_err(CliError::from)
        .context("Failed to start simulation")?;
    let sim_config = simulation.config();
    info!(
        simulation = %sim_config.simulation_id,
        tire = %sim_config.powertrain.tire_spec,
        seed = ?sim_config.seed,
        max_ticks = ?sim_config.max_ticks,
        layout = %sim_config.point_layout,
        "Starting simulation"
    );

    let sink: Box<dyn TelemetrySink> = match args.output {
        TelemetryOutput::JsonLines => Box::new(JsonLinesSink::new(tokio::io::stdout())),
        TelemetryOutput::Log => Box::new(TracingSink),
    };

    let handle = simulation.spawn(sink);
    let trigger = handle.shutdown_trigger();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Error waiting for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C");
        if !trigger.fire() {
            debug!("Simulation already stopped");
        }
    });

    let summary = handle.join().await.map_err(CliError::from)?;

    if args.output == TelemetryOutput::JsonLines {
        output::write_summary(&mut std::io::stderr().lock(), &summary, json)?;
    } else {
        output::write_summary(&mut std::io::stdout().lock(), &summary, json)?;
    }
    Ok(())
}

pub fn torque_curve(args: &TorqueCurveArgs, json: bool) -> Result<()> {
    if !(args.rpm_step.is_finite() && args.rpm_step >= MIN_RPM_STEP) {
        return Err(CliError::InvalidArgument(format!(
            "--rpm-step must be at least {MIN_RPM_STEP}, got {}",
            args.rpm_step
        ))
        .into());
    }
    if let Some(bad) = args.throttles.iter().find(|t| !(0.0..=1.0).contains(*t)) {
        return Err(CliError::InvalidArgument(format!(
            "--throttle values must be between 0.0 and 1.0, got {bad}"
        ))
        .into());
    }

    let config = load_config(args.config.as_deref())?;
    let mut spec = config.powertrain.engine;
    if args.noiseless {
        spec = spec.noiseless();
    }
    let noise = match args.seed.or(config.seed) {
        Some(seed) => Noise::from_seed(seed),
        None => Noise::from_entropy(),
    };
    let mut engine = Engine::new(spec, noise);

    let throttles: &[f64] = if args.throttles.is_empty() {
        &DEFAULT_SWEEP_THROTTLES
    } else {
        &args.throttles
    };
    let points = torque_curve_sweep(&mut engine, throttles, args.rpm_step);
    debug!(points = points.len(), "Torque curve sampled");

    let mut out = std::io::stdout().lock();
    if json {
        let timestamp = Utc::now();
        for point in &points {
            let line = TelemetryPoint::torque_curve(point, &config.simulation_id, timestamp);
            serde_json::to_writer(&mut out, &line).map_err(CliError::from)?;
            writeln!(out)?;
        }
    } else {
        output::write_torque_curve(&mut out, &points)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn run_args() -> RunArgs {
        RunArgs {
            config: None,
            seed: None,
            ticks: None,
            tire: None,
            gear: None,
            simulation_id: None,
            slip: None,
            no_sweep: false,
            no_shift: false,
            output: TelemetryOutput::JsonLines,
            layout: None,
        }
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let mut config = SimulationConfig::default();
        run_args().apply(&mut config);
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_overrides_applied() {
        let args = RunArgs {
            seed: Some(9),
            ticks: Some(100),
            tire: Some("225/45R17".to_string()),
            gear: Some(2),
            simulation_id: Some("bench".to_string()),
            slip: Some(-0.05),
            no_sweep: true,
            no_shift: true,
            layout: Some(PointLayout::PerComponent),
            ..run_args()
        };
        let mut config = SimulationConfig::default();
        args.apply(&mut config);

        assert_eq!(config.seed, Some(9));
        assert_eq!(config.max_ticks, Some(100));
        assert_eq!(config.powertrain.tire_spec, "225/45R17");
        assert_eq!(config.initial_gear, 2);
        assert_eq!(config.simulation_id, "bench");
        assert!((config.slip_ratio + 0.05).abs() < f64::EPSILON);
        assert!(!config.accelerator.enabled);
        assert!(!config.gear_shift.enabled);
        assert_eq!(config.point_layout, PointLayout::PerComponent);
    }

    #[test]
    fn test_load_config_from_yaml() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sim.yaml");
        std::fs::write(&path, "simulation_id: yaml-run\ninitial_gear: 2\n")?;

        let config = load_config(Some(&path))?;
        assert_eq!(config.simulation_id, "yaml-run");
        assert_eq!(config.initial_gear, 2);
        Ok(())
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Some(Path::new("/nonexistent/sim.json")));
        let Err(err) = result else {
            panic!("missing file should fail");
        };
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Config(_))
        ));
    }

    fn curve_args(rpm_step: f64) -> TorqueCurveArgs {
        TorqueCurveArgs {
            config: None,
            throttles: Vec::new(),
            rpm_step,
            seed: Some(1),
            noiseless: true,
        }
    }

    #[test]
    fn test_torque_curve_rejects_bad_step() {
        let Err(err) = torque_curve(&curve_args(0.0), false) else {
            panic!("zero step should fail");
        };
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_torque_curve_rejects_sub_rpm_step() {
        for step in [1e-9, 0.5, MIN_RPM_STEP - f64::EPSILON] {
            let Err(err) = torque_curve(&curve_args(step), false) else {
                panic!("step {step} should fail");
            };
            assert!(
                matches!(
                    err.downcast_ref::<CliError>(),
                    Some(CliError::InvalidArgument(msg)) if msg.contains("at least 1")
                ),
                "step {step}: {err}"
            );
        }
    }
}
