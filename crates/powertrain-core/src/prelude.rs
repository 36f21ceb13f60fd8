//! Prelude for powertrain-core.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use powertrain_core::prelude::*;
//!
//! let mut gearbox = Gearbox::new(GearboxSpec::six_speed());
//! assert!(gearbox.set_gear(6));
//! assert!(!gearbox.shift_up());
//! ```

pub use crate::differential::Differential;
pub use crate::engine::{Engine, EngineSpec};
pub use crate::error::{PowertrainError, PowertrainResult};
pub use crate::gearbox::{Gearbox, GearboxSpec};
pub use crate::noise::Noise;
pub use crate::powertrain::{Powertrain, PowertrainSpec};
pub use crate::sweep::{TorqueCurvePoint, torque_curve_sweep};
pub use crate::telemetry::{EngineState, PowertrainSnapshot};
pub use crate::tire::TireSize;
pub use crate::wheel::{VehicleSpeed, WheelPair};
