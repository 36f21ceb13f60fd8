//! Discrete-time powertrain models.
//!
//! This crate holds the physical core of the simulator: an engine producing
//! torque and RPM from throttle input, a gearbox with a slipping clutch and
//! rotational inertia, an open differential, and a tire/wheel model that turns
//! angular speed into vehicle speed.
//!
//! Every model is a plain owned value advanced by an explicit `update(dt)`
//! call. Nothing here spawns tasks, takes locks or performs I/O; the async
//! driver in `powertrain-sim` owns one [`Powertrain`] and feeds it inputs.
//!
//! # Coupling order
//!
//! [`Powertrain::step`] advances the components in a fixed order within one
//! tick: engine, then gearbox (after receiving the engine's RPM and torque
//! through [`Gearbox::set_input`]), then differential, then wheels.
//!
//! # Example
//!
//! ```
//! use powertrain_core::{Noise, Powertrain, PowertrainSpec};
//!
//! let mut noise = Noise::from_seed(7);
//! let mut powertrain = Powertrain::from_spec(&PowertrainSpec::default(), &mut noise)?;
//!
//! powertrain.gearbox_mut().set_gear(1);
//! powertrain.gearbox_mut().set_clutch(1.0);
//! powertrain.engine_mut().set_accelerator_position(0.5);
//!
//! for _ in 0..10 {
//!     powertrain.step(0.1);
//! }
//!
//! let snapshot = powertrain.snapshot();
//! assert!(snapshot.engine.rpm >= 800.0);
//! # Ok::<(), powertrain_core::PowertrainError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![warn(missing_debug_implementations)]

pub mod differential;
pub mod engine;
pub mod error;
pub mod gearbox;
pub mod noise;
pub mod powertrain;
pub mod prelude;
pub mod sweep;
pub mod telemetry;
pub mod tire;
pub mod wheel;

pub use differential::{Differential, TYPE_R_DIFF_RATIO};
pub use engine::{Engine, EngineSpec};
pub use error::{PowertrainError, PowertrainResult};
pub use gearbox::{Gearbox, GearboxSpec, NEUTRAL_GEAR};
pub use noise::Noise;
pub use powertrain::{DEFAULT_TIRE_SPEC, Powertrain, PowertrainSpec};
pub use sweep::{
    DEFAULT_SWEEP_RPM_STEP, DEFAULT_SWEEP_THROTTLES, MAX_SWEEP_POINTS, TorqueCurvePoint,
    torque_curve_sweep,
};
pub use telemetry::{
    DifferentialTelemetry, EngineState, EngineTelemetry, GearboxTelemetry, PowertrainSnapshot,
    WheelTelemetry,
};
pub use tire::{TireInfo, TireSize};
pub use wheel::{VehicleSpeed, Wheel, WheelPair};

/// Conversion factor from RPM to rad/s.
pub const RPM_TO_RAD_PER_SEC: f64 = 2.0 * std::f64::consts::PI / 60.0;

/// Conversion factor from rad/s to RPM, as used by the gearbox inertia term.
pub const RAD_PER_SEC_TO_RPM: f64 = 9.549;

/// Conversion factor from m/s to km/h.
pub const MS_TO_KMH: f64 = 3.6;

/// Conversion factor from m/s to mph.
pub const MS_TO_MPH: f64 = 2.237;

pub(crate) const INCH_TO_MM: f64 = 25.4;
pub(crate) const MM_TO_M: f64 = 0.001;

/// Clamp a normalized control input to `[0, 1]`. NaN maps to `0`.
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Sanitize a timestep: non-finite or negative values become `0`.
#[inline]
pub(crate) fn sanitize_dt(dt: f64) -> f64 {
    if dt.is_finite() { dt.max(0.0) } else { 0.0 }
}
