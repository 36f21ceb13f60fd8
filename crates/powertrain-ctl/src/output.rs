//! Output formatting for CLI responses

use std::io::Write;

use anyhow::Error;
use powertrain_core::TorqueCurvePoint;
use powertrain_sim::SimulationSummary;
use serde_json::json;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("Error: {error}");

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  Caused by: {err}");
        source = err.source();
    }
}

pub fn summary_json(summary: &SimulationSummary) -> serde_json::Value {
    json!({
        "success": true,
        "ticks": summary.ticks,
        "driving_ticks": summary.driving_ticks,
        "points_written": summary.points_written,
        "points_dropped": summary.points_dropped,
        "sink_failures": summary.sink_failures,
        "final_frame": summary.final_frame,
    })
}

/// Write the run summary. `out` is stderr when stdout carries telemetry.
pub fn write_summary(
    out: &mut impl Write,
    summary: &SimulationSummary,
    json: bool,
) -> std::io::Result<()> {
    if json {
        let text = serde_json::to_string_pretty(&summary_json(summary))?;
        return writeln!(out, "{text}");
    }

    writeln!(out, "Simulation finished after {} ticks", summary.ticks)?;
    writeln!(out, "  Driving ticks:  {}", summary.driving_ticks)?;
    writeln!(
        out,
        "  Points:         {} written, {} dropped, {} failed",
        summary.points_written, summary.points_dropped, summary.sink_failures
    )?;
    writeln!(out, "Final state:")?;
    writeln!(out, "{}", summary.final_frame.powertrain)
}

/// Human-readable torque curve, one block per throttle position.
pub fn write_torque_curve(
    out: &mut impl Write,
    points: &[TorqueCurvePoint],
) -> std::io::Result<()> {
    let mut current: Option<f64> = None;
    for point in points {
        let same_block =
            current.is_some_and(|t| (t - point.accelerator_position).abs() < f64::EPSILON);
        if !same_block {
            current = Some(point.accelerator_position);
            writeln!(
                out,
                "\nThrottle {:.0}%\n{:>8} {:>12} {:>10}",
                point.accelerator_position * 100.0,
                "RPM",
                "Torque (Nm)",
                "Power (kW)"
            )?;
        }
        writeln!(
            out,
            "{:>8.0} {:>12.1} {:>10.1}",
            point.rpm, point.torque_nm, point.power_kw
        )?;
    }
    Ok(())
}
