//! Simulation configuration.
//!
//! Every field has a default, so an empty JSON object or YAML document is a
//! valid configuration. Durations are stored in milliseconds.

use std::path::Path;
use std::time::Duration;

use powertrain_core::{NEUTRAL_GEAR, PowertrainSpec, TireSize};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::point::PointLayout;

/// Tag value identifying the simulated vehicle when none is configured.
pub const DEFAULT_SIMULATION_ID: &str = "engine1";

/// Smallest accepted ramp increment (throttle sweep and clutch steps).
pub const MIN_INCREMENT: f64 = 0.001;

/// Throttle sweep actuator: ramps 0 → 1 → 0 indefinitely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorSweepConfig {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    /// Throttle change per step, in [0.001, 1].
    pub increment: f64,
    pub step_delay_ms: u64,
    /// Pause at full throttle and again at idle.
    pub hold_ms: u64,
}

impl Default for AcceleratorSweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 1000,
            increment: 0.05,
            step_delay_ms: 500,
            hold_ms: 2000,
        }
    }
}

impl AcceleratorSweepConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

/// Automatic gear-shift actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearShiftConfig {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub upshift_rpm: f64,
    pub downshift_rpm: f64,
    /// Never downshift below this gear.
    pub lowest_gear: u8,
    /// Throttle held while the shift is in progress.
    pub shift_throttle: f64,
    /// Wait after lifting the throttle, before pressing the clutch.
    pub throttle_lift_ms: u64,
    /// Wait after pressing the clutch, before changing gear.
    pub clutch_press_ms: u64,
    /// Wait after changing gear, before releasing the clutch.
    pub gear_change_ms: u64,
    /// Clutch increment per release step, in [0.001, 1].
    pub clutch_step: f64,
    pub clutch_step_ms: u64,
}

impl Default for GearShiftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 2000,
            poll_interval_ms: 500,
            upshift_rpm: 4000.0,
            downshift_rpm: 2000.0,
            lowest_gear: 1,
            shift_throttle: 0.3,
            throttle_lift_ms: 100,
            clutch_press_ms: 200,
            gear_change_ms: 200,
            clutch_step: 0.2,
            clutch_step_ms: 50,
        }
    }
}

impl GearShiftConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn throttle_lift(&self) -> Duration {
        Duration::from_millis(self.throttle_lift_ms)
    }

    pub fn clutch_press(&self) -> Duration {
        Duration::from_millis(self.clutch_press_ms)
    }

    pub fn gear_change(&self) -> Duration {
        Duration::from_millis(self.gear_change_ms)
    }

    pub fn clutch_step_delay(&self) -> Duration {
        Duration::from_millis(self.clutch_step_ms)
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Value of the `simulation` tag on every telemetry point.
    pub simulation_id: String,
    /// Noise seed. `None` draws one from the OS entropy source.
    pub seed: Option<u64>,
    pub tick_period_ms: u64,
    /// Integration timestep in seconds passed to every component.
    pub dt: f64,
    /// Idle time in neutral before the first gear is engaged.
    pub warm_up_ms: u64,
    /// Clutch increment per tick while engaging the first gear.
    pub clutch_engage_step: f64,
    pub initial_gear: u8,
    /// Constant slip ratio fed to the differential.
    pub slip_ratio: f64,
    /// Stop after this many ticks in the driving phase.
    pub max_ticks: Option<u64>,
    pub control_buffer: usize,
    pub telemetry_buffer: usize,
    /// How each tick is split into telemetry points.
    pub point_layout: PointLayout,
    pub powertrain: PowertrainSpec,
    pub accelerator: AcceleratorSweepConfig,
    pub gear_shift: GearShiftConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation_id: DEFAULT_SIMULATION_ID.to_string(),
            seed: None,
            tick_period_ms: 100,
            dt: 0.1,
            warm_up_ms: 2000,
            clutch_engage_step: 0.2,
            initial_gear: 1,
            slip_ratio: 0.0,
            max_ticks: None,
            control_buffer: 64,
            telemetry_buffer: 256,
            point_layout: PointLayout::Combined,
            powertrain: PowertrainSpec::default(),
            accelerator: AcceleratorSweepConfig::default(),
            gear_shift: GearShiftConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load a JSON or YAML file (by extension) and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, has an
    /// unknown extension, or fails [`SimulationConfig::validate`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match extension.as_deref() {
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?
            }
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn warm_up(&self) -> Duration {
        Duration::from_millis(self.warm_up_ms)
    }

    /// Ticks spent idling before engagement, rounded up.
    pub fn warm_up_ticks(&self) -> u64 {
        if self.tick_period_ms == 0 {
            return 0;
        }
        self.warm_up_ms.div_ceil(self.tick_period_ms)
    }

    /// Check every numeric parameter and parse the tire specification.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found. A malformed tire spec is
    /// reported as [`ConfigError::Powertrain`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation_id.trim().is_empty() {
            return Err(ConfigError::invalid("simulation_id", "cannot be empty"));
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::invalid("tick_period_ms", "must be positive"));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::invalid("dt", "must be a positive number"));
        }
        check_increment("clutch_engage_step", self.clutch_engage_step)?;
        if !self.slip_ratio.is_finite() {
            return Err(ConfigError::invalid("slip_ratio", "must be finite"));
        }
        if self.control_buffer == 0 {
            return Err(ConfigError::invalid("control_buffer", "must be positive"));
        }
        if self.telemetry_buffer == 0 {
            return Err(ConfigError::invalid("telemetry_buffer", "must be positive"));
        }

        self.validate_powertrain()?;

        let max_gear = self.powertrain.gearbox.max_gear();
        if self.initial_gear == NEUTRAL_GEAR || self.initial_gear > max_gear {
            return Err(ConfigError::invalid(
                "initial_gear",
                format!("must be between 1 and {max_gear}"),
            ));
        }

        let accel = &self.accelerator;
        check_increment("accelerator.increment", accel.increment)?;

        let shift = &self.gear_shift;
        if shift.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "gear_shift.poll_interval_ms",
                "must be positive",
            ));
        }
        if !(shift.downshift_rpm.is_finite() && shift.upshift_rpm.is_finite()) {
            return Err(ConfigError::invalid(
                "gear_shift",
                "shift thresholds must be finite",
            ));
        }
        if shift.downshift_rpm >= shift.upshift_rpm {
            return Err(ConfigError::invalid(
                "gear_shift",
                format!(
                    "downshift_rpm ({}) must be below upshift_rpm ({})",
                    shift.downshift_rpm, shift.upshift_rpm
                ),
            ));
        }
        if shift.lowest_gear == NEUTRAL_GEAR || shift.lowest_gear > max_gear {
            return Err(ConfigError::invalid(
                "gear_shift.lowest_gear",
                format!("must be between 1 and {max_gear}"),
            ));
        }
        if !(0.0..=1.0).contains(&shift.shift_throttle) {
            return Err(ConfigError::invalid(
                "gear_shift.shift_throttle",
                "must be between 0.0 and 1.0",
            ));
        }
        check_increment("gear_shift.clutch_step", shift.clutch_step)?;

        Ok(())
    }

    fn validate_powertrain(&self) -> Result<(), ConfigError> {
        let engine = &self.powertrain.engine;
        if !(engine.idle_rpm.is_finite() && engine.idle_rpm > 0.0) {
            return Err(ConfigError::invalid(
                "powertrain.engine.idle_rpm",
                "must be positive",
            ));
        }
        if !(engine.max_rpm.is_finite() && engine.max_rpm > engine.idle_rpm) {
            return Err(ConfigError::invalid(
                "powertrain.engine.max_rpm",
                "must be above idle_rpm",
            ));
        }
        if !(engine.min_oil_temp_c.is_finite()
            && engine.max_oil_temp_c.is_finite()
            && engine.min_oil_temp_c < engine.max_oil_temp_c)
        {
            return Err(ConfigError::invalid(
                "powertrain.engine",
                "oil temperature range must be finite and non-empty",
            ));
        }
        for (field, amplitude) in [
            ("powertrain.engine.rpm_noise", engine.rpm_noise),
            ("powertrain.engine.oil_temp_noise", engine.oil_temp_noise),
            ("powertrain.engine.torque_noise", engine.torque_noise),
        ] {
            if !(amplitude.is_finite() && amplitude >= 0.0) {
                return Err(ConfigError::invalid(field, "must be finite and non-negative"));
            }
        }

        let gearbox = &self.powertrain.gearbox;
        if gearbox.gear_ratios.len() < 2 {
            return Err(ConfigError::invalid(
                "powertrain.gearbox.gear_ratios",
                "needs neutral plus at least one gear",
            ));
        }
        if gearbox.gear_ratios.len() > usize::from(u8::MAX) {
            return Err(ConfigError::invalid(
                "powertrain.gearbox.gear_ratios",
                "too many gears",
            ));
        }
        if gearbox.gear_inertias.len() != gearbox.gear_ratios.len() {
            return Err(ConfigError::invalid(
                "powertrain.gearbox.gear_inertias",
                format!(
                    "expected {} entries to match gear_ratios",
                    gearbox.gear_ratios.len()
                ),
            ));
        }
        if gearbox
            .gear_ratios
            .iter()
            .skip(1)
            .any(|ratio| !(ratio.is_finite() && *ratio > 0.0))
        {
            return Err(ConfigError::invalid(
                "powertrain.gearbox.gear_ratios",
                "every forward gear needs a positive ratio",
            ));
        }
        if !(gearbox.final_drive.is_finite() && gearbox.final_drive > 0.0) {
            return Err(ConfigError::invalid(
                "powertrain.gearbox.final_drive",
                "must be positive",
            ));
        }
        if !(self.powertrain.differential_ratio.is_finite()
            && self.powertrain.differential_ratio > 0.0)
        {
            return Err(ConfigError::invalid(
                "powertrain.differential_ratio",
                "must be positive",
            ));
        }

        TireSize::parse(&self.powertrain.tire_spec)?;
        Ok(())
    }
}

fn check_increment(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (MIN_INCREMENT..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be between {MIN_INCREMENT} and 1.0"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_defaults_are_valid() -> TestResult {
        let config = SimulationConfig::default();
        config.validate()?;
        assert_eq!(config.simulation_id, "engine1");
        assert_eq!(config.tick_period(), Duration::from_millis(100));
        assert_eq!(config.warm_up_ticks(), 20);
        assert_eq!(config.powertrain.tire_spec, "245/40R19");
        Ok(())
    }

    #[test]
    fn test_tiny_increments_rejected() {
        let mut config = SimulationConfig::default();
        config.accelerator.increment = 1e-12;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "accelerator.increment",
                ..
            })
        ));

        let mut config = SimulationConfig::default();
        config.gear_shift.clutch_step = MIN_INCREMENT / 2.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "gear_shift.clutch_step",
                ..
            })
        ));

        let mut config = SimulationConfig::default();
        config.accelerator.increment = MIN_INCREMENT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_tire_rejected() {
        let mut config = SimulationConfig::default();
        config.powertrain.tire_spec = "not-a-tire".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Powertrain(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases: Vec<(&str, Box<dyn Fn(&mut SimulationConfig)>)> = vec![
            ("tick_period_ms", Box::new(|c| c.tick_period_ms = 0)),
            ("dt", Box::new(|c| c.dt = 0.0)),
            ("dt", Box::new(|c| c.dt = f64::NAN)),
            ("initial_gear", Box::new(|c| c.initial_gear = 0)),
            ("initial_gear", Box::new(|c| c.initial_gear = 8)),
            (
                "accelerator.increment",
                Box::new(|c| c.accelerator.increment = 1.5),
            ),
            (
                "gear_shift.clutch_step",
                Box::new(|c| c.gear_shift.clutch_step = 0.0),
            ),
            (
                "gear_shift",
                Box::new(|c| c.gear_shift.downshift_rpm = 5000.0),
            ),
            ("clutch_engage_step", Box::new(|c| c.clutch_engage_step = -0.2)),
            (
                "clutch_engage_step",
                Box::new(|c| c.clutch_engage_step = 1e-9),
            ),
            (
                "powertrain.gearbox.gear_inertias",
                Box::new(|c| c.powertrain.gearbox.gear_inertias.truncate(3)),
            ),
            (
                "powertrain.engine.rpm_noise",
                Box::new(|c| c.powertrain.engine.rpm_noise = -1.0),
            ),
        ];

        for (expected_field, mutate) in cases {
            let mut config = SimulationConfig::default();
            mutate(&mut config);
            match config.validate() {
                Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("expected {expected_field} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_six_speed_limits_initial_gear() {
        let mut config = SimulationConfig::default();
        config.powertrain.gearbox = powertrain_core::GearboxSpec::six_speed();
        config.initial_gear = 7;
        assert!(config.validate().is_err());
        config.initial_gear = 6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_with_partial_overrides() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        writeln!(
            file,
            "simulation_id: bench\nseed: 42\nmax_ticks: 50\npowertrain:\n  tire_spec: 205/55R16\ngear_shift:\n  upshift_rpm: 5000.0\npoint_layout: per_component\n"
        )?;

        let config = SimulationConfig::from_path(file.path())?;
        assert_eq!(config.simulation_id, "bench");
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.max_ticks, Some(50));
        assert_eq!(config.powertrain.tire_spec, "205/55R16");
        assert_relative_eq!(config.gear_shift.upshift_rpm, 5000.0);
        assert_relative_eq!(config.gear_shift.downshift_rpm, 2000.0);
        assert_eq!(config.point_layout, PointLayout::PerComponent);
        Ok(())
    }

    #[test]
    fn test_from_json() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
        write!(file, r#"{{"initial_gear": 2, "accelerator": {{"enabled": false}}}}"#)?;

        let config = SimulationConfig::from_path(file.path())?;
        assert_eq!(config.initial_gear, 2);
        assert!(!config.accelerator.enabled);
        assert!(config.gear_shift.enabled);
        Ok(())
    }

    #[test]
    fn test_from_path_rejects_bad_tire_and_format() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
        write!(file, r#"{{"powertrain": {{"tire_spec": "19 inch"}}}}"#)?;
        assert!(matches!(
            SimulationConfig::from_path(file.path()),
            Err(ConfigError::Powertrain(_))
        ));

        let toml = tempfile::Builder::new().suffix(".toml").tempfile()?;
        assert!(matches!(
            SimulationConfig::from_path(toml.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            SimulationConfig::from_path("/definitely/not/here.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
