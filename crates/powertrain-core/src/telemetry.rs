//! Read-only telemetry snapshots.
//!
//! Snapshots are value copies taken on demand. They never alias the mutable
//! component state they were taken from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tire::TireInfo;
use crate::wheel::VehicleSpeed;

/// Categorical engine condition derived from RPM and oil temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EngineState {
    #[serde(rename = "low_idle")]
    LowIdle,
    #[serde(rename = "rpm_limit")]
    RpmLimit,
    #[serde(rename = "oilTemp_high")]
    OilTempHigh,
    #[default]
    #[serde(rename = "normal")]
    Normal,
}

impl EngineState {
    /// Stable label used in telemetry fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::LowIdle => "low_idle",
            EngineState::RpmLimit => "rpm_limit",
            EngineState::OilTempHigh => "oilTemp_high",
            EngineState::Normal => "normal",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nominal maximum power used by [`EngineTelemetry::efficiency_percent`].
pub const NOMINAL_MAX_POWER_KW: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineTelemetry {
    pub rpm: f64,
    pub torque_nm: f64,
    pub oil_temp_c: f64,
    pub accelerator_position: f64,
    pub power_kw: f64,
    pub power_hp: f64,
    pub state: EngineState,
}

impl EngineTelemetry {
    /// Power output as a percentage of `max_theoretical_kw`.
    pub fn efficiency_percent(&self, max_theoretical_kw: f64) -> f64 {
        if max_theoretical_kw <= 0.0 {
            return 0.0;
        }
        self.power_kw / max_theoretical_kw * 100.0
    }
}

impl fmt::Display for EngineTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Engine [Speed: {:.0} rpm, AccelPos: {:.1} %, Torque: {:.1} Nm, OilTemp: {:.1}°C, Power: {:.1} kW, Power: {:.1} HP, State: {}]",
            self.rpm,
            self.accelerator_position * 100.0,
            self.torque_nm,
            self.oil_temp_c,
            self.power_kw,
            self.power_hp,
            self.state,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GearboxTelemetry {
    pub current_gear: u8,
    pub clutch_position: f64,
    pub input_shaft_rpm: f64,
    pub input_shaft_torque_nm: f64,
    pub output_shaft_rpm: f64,
    pub output_shaft_torque_nm: f64,
    /// rad/s²
    pub input_shaft_acceleration: f64,
    /// rad/s²
    pub output_shaft_acceleration: f64,
}

impl fmt::Display for GearboxTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gearbox [Gear: {}, Clutch: {:.1} %, InputShaft: {:.0} rpm, OutputShaft: {:.0} rpm, InputShaftTorque: {:.1} Nm, OutputShaftTorque: {:.1} Nm]",
            self.current_gear,
            self.clutch_position * 100.0,
            self.input_shaft_rpm,
            self.output_shaft_rpm,
            self.input_shaft_torque_nm,
            self.output_shaft_torque_nm,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifferentialTelemetry {
    pub wheel_speed_left_rpm: f64,
    pub wheel_speed_right_rpm: f64,
    pub torque_left_nm: f64,
    pub torque_right_nm: f64,
    pub slip_ratio: f64,
}

impl fmt::Display for DifferentialTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Differential [WheelSpeedL: {:.0} rpm, WheelSpeedR: {:.0} rpm, Slip: {:.2}]",
            self.wheel_speed_left_rpm, self.wheel_speed_right_rpm, self.slip_ratio,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelTelemetry {
    pub wheel_speed_left_rpm: f64,
    pub wheel_speed_right_rpm: f64,
    pub vehicle_speed: VehicleSpeed,
    /// Both wheels of a pair share one tire size.
    pub tire: TireInfo,
}

impl fmt::Display for WheelTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wheels [WheelSpeedL: {:.2} rpm, WheelSpeedR: {:.2} rpm, VehicleSpeed: {:.2} km/h]",
            self.wheel_speed_left_rpm, self.wheel_speed_right_rpm, self.vehicle_speed.kmh,
        )
    }
}

/// Consistent view of every component after one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowertrainSnapshot {
    pub engine: EngineTelemetry,
    pub gearbox: GearboxTelemetry,
    pub differential: DifferentialTelemetry,
    pub wheels: WheelTelemetry,
}

impl fmt::Display for PowertrainSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.engine, self.gearbox, self.differential, self.wheels
        )
    }
}
