//! Async driver for the powertrain models in `powertrain-core`.
//!
//! A [`Simulation`] advances one [`powertrain_core::Powertrain`] at a fixed
//! tick rate on a Tokio runtime. The driver walks through three phases:
//!
//! 1. **Idling** - throttle closed, neutral, clutch pressed, for the warm-up
//!    period.
//! 2. **Engaging** - the initial gear is selected and the clutch released in
//!    steps, one step per tick.
//! 3. **Driving** - the start gate opens, the accelerator sweep and the
//!    automatic gear shifter start issuing [`ControlIntent`]s, and every tick
//!    is reported to a [`TelemetrySink`].
//!
//! The tick task is the only owner of the powertrain. Everything else talks
//! to it through channels.
//!
//! # Example
//!
//! ```no_run
//! use powertrain_sim::prelude::*;
//!
//! # async fn demo() -> Result<(), SimError> {
//! let config = SimulationConfig {
//!     seed: Some(42),
//!     max_ticks: Some(600),
//!     ..SimulationConfig::default()
//! };
//!
//! let summary = Simulation::new(config)?.run(TracingSink).await?;
//! println!("final speed: {:.1} km/h", summary.final_frame.powertrain.wheels.vehicle_speed.kmh);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![warn(missing_debug_implementations)]

pub mod actuators;
pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod gate;
pub mod point;
pub mod prelude;
pub mod sink;

pub use actuators::{MAX_RAMP_STEPS, ShiftDecision, decide_shift, ramp};
pub use config::{
    AcceleratorSweepConfig, DEFAULT_SIMULATION_ID, GearShiftConfig, MIN_INCREMENT,
    SimulationConfig,
};
pub use control::{ControlIntent, ControlSender};
pub use driver::{DriverPhase, Simulation, SimulationFrame, SimulationHandle, SimulationSummary};
pub use error::{ConfigError, SimError, SimResult, SinkError};
pub use gate::{GateWaiter, Shutdown, ShutdownTrigger, StartGate};
pub use point::{FieldValue, PointLayout, TelemetryPoint};
pub use sink::{ChannelSink, JsonLinesSink, ReporterStats, TelemetrySink, TracingSink};
