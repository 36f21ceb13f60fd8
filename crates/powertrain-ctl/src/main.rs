//! powertrain-ctl - Powertrain Simulation CLI
//!
//! Runs the fixed-tick powertrain simulation with its actuator tasks and
//! streams telemetry, or samples the engine's static torque curve.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{RunArgs, TorqueCurveArgs};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "powertrain-ctl")]
#[command(about = "Powertrain simulation CLI - drive a simulated engine, gearbox and wheels")]
#[command(version)]
#[command(long_about = "
powertrain-ctl drives a discrete-time vehicle powertrain: an engine, a seven-speed
gearbox with a slipping clutch, an open differential and a pair of wheels.

`run` warms the engine up at idle, engages the first gear and then lets the
accelerator sweep and the automatic gear shifter drive, writing one telemetry
point per tick. Logs go to stderr; use -v, -vv or RUST_LOG to see them.
")]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation and stream telemetry
    Run(RunArgs),

    /// Sample the engine torque curve over its RPM range
    TorqueCurve(TorqueCurveArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("powertrain_ctl={log_level},powertrain_sim={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = execute_command(&cli).await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => commands::run(args, cli.json).await,
        Commands::TorqueCurve(args) => commands::torque_curve(args, cli.json),
    }
}
