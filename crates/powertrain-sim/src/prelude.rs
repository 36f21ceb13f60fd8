//! Prelude for powertrain-sim.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use powertrain_sim::prelude::*;
//!
//! let config = SimulationConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.warm_up_ticks(), 20);
//! ```

pub use crate::config::{AcceleratorSweepConfig, GearShiftConfig, SimulationConfig};
pub use crate::control::{ControlIntent, ControlSender};
pub use crate::driver::{DriverPhase, Simulation, SimulationFrame, SimulationHandle, SimulationSummary};
pub use crate::error::{ConfigError, SimError, SimResult, SinkError};
pub use crate::point::{PointLayout, TelemetryPoint};
pub use crate::sink::{ChannelSink, JsonLinesSink, TelemetrySink, TracingSink};
