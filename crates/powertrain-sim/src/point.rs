//! Structured telemetry points handed to a [`crate::TelemetrySink`].
//!
//! A point is a measurement name, string tags, named field values and a
//! timestamp. The sink decides how (and whether) to persist it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use powertrain_core::telemetry::NOMINAL_MAX_POWER_KW;
use powertrain_core::{
    DifferentialTelemetry, EngineTelemetry, GearboxTelemetry, TorqueCurvePoint, WheelTelemetry,
};
use serde::{Deserialize, Serialize};

use crate::driver::SimulationFrame;
use crate::error::ConfigError;

pub const POWERTRAIN_MEASUREMENT: &str = "powertrain_data";
pub const ENGINE_MEASUREMENT: &str = "engine_data";
pub const GEARBOX_MEASUREMENT: &str = "gearbox_data";
pub const TORQUE_CURVE_MEASUREMENT: &str = "torque_curve";

pub const SIMULATION_TAG: &str = "simulation";
pub const ACCEL_POSITION_TAG: &str = "accel_position";

/// How one simulation frame is split into points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLayout {
    /// One `powertrain_data` point carrying every field.
    #[default]
    Combined,
    /// Separate `engine_data` and `gearbox_data` points, plus a
    /// `powertrain_data` point for the differential and wheels.
    PerComponent,
}

impl PointLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::PerComponent => "per_component",
        }
    }

    /// Points written for `frame`, in order.
    pub fn points(self, frame: &SimulationFrame, simulation_id: &str) -> Vec<TelemetryPoint> {
        match self {
            Self::Combined => vec![TelemetryPoint::from_frame(frame, simulation_id)],
            Self::PerComponent => {
                let snapshot = &frame.powertrain;
                vec![
                    TelemetryPoint::engine(&snapshot.engine, simulation_id, frame.timestamp)
                        .with_frame_fields(frame),
                    TelemetryPoint::gearbox(&snapshot.gearbox, simulation_id, frame.timestamp)
                        .with_frame_fields(frame),
                    TelemetryPoint::new(POWERTRAIN_MEASUREMENT, frame.timestamp)
                        .tag(SIMULATION_TAG, simulation_id)
                        .with_frame_fields(frame)
                        .with_wheel_fields(&snapshot.differential, &snapshot.wheels),
                ]
            }
        }
    }
}

impl fmt::Display for PointLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "combined" => Ok(Self::Combined),
            "per_component" => Ok(Self::PerComponent),
            _ => Err(ConfigError::invalid(
                "point_layout",
                format!("unknown layout {s:?} (expected combined or per-component)"),
            )),
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}i"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryPoint {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Every field of one tick: engine, gearbox, differential and wheels.
    pub fn from_frame(frame: &SimulationFrame, simulation_id: &str) -> Self {
        let snapshot = &frame.powertrain;

        Self::new(POWERTRAIN_MEASUREMENT, frame.timestamp)
            .tag(SIMULATION_TAG, simulation_id)
            .with_frame_fields(frame)
            .with_engine_fields(&snapshot.engine)
            .with_gearbox_fields(&snapshot.gearbox)
            .with_wheel_fields(&snapshot.differential, &snapshot.wheels)
    }


    /// Engine-only point.
    pub fn engine(
        engine: &EngineTelemetry,
        simulation_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(ENGINE_MEASUREMENT, timestamp)
            .tag(SIMULATION_TAG, simulation_id)
            .with_engine_fields(engine)
    }

    /// Gearbox-only point.
    pub fn gearbox(
        gearbox: &GearboxTelemetry,
        simulation_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(GEARBOX_MEASUREMENT, timestamp)
            .tag(SIMULATION_TAG, simulation_id)
            .with_gearbox_fields(gearbox)
    }

    /// One sample of the static torque curve, tagged with its throttle.
    pub fn torque_curve(
        point: &TorqueCurvePoint,
        simulation_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(TORQUE_CURVE_MEASUREMENT, timestamp)
            .tag(SIMULATION_TAG, simulation_id)
            .tag(
                ACCEL_POSITION_TAG,
                format!("{:.2}", point.accelerator_position),
            )
            .field("rpm", point.rpm)
            .field("torque", point.torque_nm)
            .field("power_kw", point.power_kw)
    }

    fn with_frame_fields(self, frame: &SimulationFrame) -> Self {
        self.field("tick", frame.tick)
            .field("phase", frame.phase.as_str())
    }

    fn with_engine_fields(self, engine: &EngineTelemetry) -> Self {
        self.field("rpm", engine.rpm)
            .field("torque", engine.torque_nm)
            .field("oil_temp", engine.oil_temp_c)
            .field("accel_position", engine.accelerator_position)
            .field("engine_state", engine.state.as_str())
            .field("power_kw", engine.power_kw)
            .field("power_hp", engine.power_hp)
            .field("efficiency", engine.efficiency_percent(NOMINAL_MAX_POWER_KW))
    }

    fn with_gearbox_fields(self, gearbox: &GearboxTelemetry) -> Self {
        self.field("current_gear", gearbox.current_gear)
            .field("clutch_position", gearbox.clutch_position)
            .field("input_shaft_rpm", gearbox.input_shaft_rpm)
            .field("input_shaft_torque", gearbox.input_shaft_torque_nm)
            .field("output_shaft_rpm", gearbox.output_shaft_rpm)
            .field("output_shaft_torque", gearbox.output_shaft_torque_nm)
    }

    fn with_wheel_fields(self, diff: &DifferentialTelemetry, wheels: &WheelTelemetry) -> Self {
        self.field("wheel_speed_left", wheels.wheel_speed_left_rpm)
            .field("wheel_speed_right", wheels.wheel_speed_right_rpm)
            .field("wheel_torque_left", diff.torque_left_nm)
            .field("wheel_torque_right", diff.torque_right_nm)
            .field("slip_ratio", diff.slip_ratio)
            .field("vehicle_speed_ms", wheels.vehicle_speed.ms)
            .field("vehicle_speed_kmh", wheels.vehicle_speed.kmh)
            .field("vehicle_speed_mph", wheels.vehicle_speed.mph)
    }
}

impl fmt::Display for TelemetryPoint {
    /// Line-protocol style rendering, e.g.
    /// `engine_data,simulation=engine1 rpm=800,torque=0 1700000000000000000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.measurement)?;
        for (key, value) in &self.tags {
            write!(f, ",{key}={value}")?;
        }
        let mut separator = ' ';
        for (key, value) in &self.fields {
            write!(f, "{separator}{key}={value}")?;
            separator = ',';
        }
        match self.timestamp.timestamp_nanos_opt() {
            Some(nanos) => write!(f, " {nanos}"),
            None => Ok(()),
        }
    }
}
