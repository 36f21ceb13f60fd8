//! Engine model.
//!
//! The engine integrates RPM toward a throttle-derived target, evaluates an
//! empirical torque curve, and tracks oil temperature. Combustion fluctuation
//! is emulated with bounded noise drawn from the engine's own [`Noise`].

use serde::{Deserialize, Serialize};

use crate::noise::Noise;
use crate::telemetry::{EngineState, EngineTelemetry};
use crate::{clamp_unit, sanitize_dt};

/// Divisor converting `Nm * rpm` to kW.
pub const POWER_KW_DIVISOR: f64 = 9549.297;

/// kW to mechanical horsepower.
pub const KW_TO_HP: f64 = 1.341;

/// Static limits and tuning of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSpec {
    pub idle_rpm: f64,
    pub max_rpm: f64,
    pub max_torque_nm: f64,
    /// RPM where the torque curve peaks.
    pub rpm_at_max_torque: f64,
    /// RPM where power peaks; drives the high-RPM falloff.
    pub rpm_at_max_power: f64,
    /// Response factor (0-1) weighting the approach to target RPM.
    pub inertia: f64,
    pub min_oil_temp_c: f64,
    pub max_oil_temp_c: f64,
    pub initial_oil_temp_c: f64,
    /// Fraction of RPM lost per tick when the clutch is fully disengaged.
    pub clutch_drag: f64,
    /// Amplitude of the per-tick RPM fluctuation.
    pub rpm_noise: f64,
    /// Amplitude of the per-tick oil temperature fluctuation.
    pub oil_temp_noise: f64,
    /// Relative amplitude of the torque fluctuation (0.02 = ±2%).
    pub torque_noise: f64,
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self {
            idle_rpm: 800.0,
            max_rpm: 8500.0,
            max_torque_nm: 450.0,
            rpm_at_max_torque: 3500.0,
            rpm_at_max_power: 5500.0,
            inertia: 0.3,
            min_oil_temp_c: 70.0,
            max_oil_temp_c: 120.0,
            initial_oil_temp_c: 80.0,
            clutch_drag: 0.1,
            rpm_noise: 50.0,
            oil_temp_noise: 0.5,
            torque_noise: 0.02,
        }
    }
}

impl EngineSpec {
    /// Same limits with every noise amplitude set to zero.
    pub fn noiseless(self) -> Self {
        Self {
            rpm_noise: 0.0,
            oil_temp_noise: 0.0,
            torque_noise: 0.0,
            ..self
        }
    }

    /// RPM the engine settles at for a given throttle position.
    pub fn target_rpm(&self, accelerator_position: f64) -> f64 {
        clamp_unit(accelerator_position) * (self.max_rpm - self.idle_rpm) + self.idle_rpm
    }

    fn clamp_rpm(&self, rpm: f64) -> f64 {
        if rpm.is_nan() {
            return self.idle_rpm;
        }
        rpm.max(self.idle_rpm).min(self.max_rpm)
    }

    fn clamp_oil_temp(&self, temp: f64) -> f64 {
        if temp.is_nan() {
            return self.min_oil_temp_c;
        }
        temp.max(self.min_oil_temp_c).min(self.max_oil_temp_c)
    }
}

/// Internal-combustion engine state.
#[derive(Debug, Clone)]
pub struct Engine {
    spec: EngineSpec,
    rpm: f64,
    torque: f64,
    oil_temp: f64,
    accelerator_position: f64,
    noise: Noise,
}

impl Engine {
    /// Engine at idle with the throttle closed.
    pub fn new(spec: EngineSpec, noise: Noise) -> Self {
        Self {
            rpm: spec.idle_rpm,
            torque: 0.0,
            oil_temp: spec.clamp_oil_temp(spec.initial_oil_temp_c),
            accelerator_position: 0.0,
            spec,
            noise,
        }
    }

    pub fn with_seed(spec: EngineSpec, seed: u64) -> Self {
        Self::new(spec, Noise::from_seed(seed))
    }

    pub fn spec(&self) -> &EngineSpec {
        &self.spec
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    pub fn torque(&self) -> f64 {
        self.torque
    }

    pub fn oil_temp(&self) -> f64 {
        self.oil_temp
    }

    pub fn accelerator_position(&self) -> f64 {
        self.accelerator_position
    }

    /// Set the throttle. Values outside `[0, 1]` are clamped.
    pub fn set_accelerator_position(&mut self, position: f64) {
        self.accelerator_position = clamp_unit(position);
    }

    /// Force the crankshaft speed, clamped to `[idle, max]`.
    ///
    /// Used to sweep the static torque curve without running the RPM dynamics.
    pub fn set_rpm(&mut self, rpm: f64) {
        self.rpm = self.spec.clamp_rpm(rpm);
    }

    /// Advance the engine by `dt` seconds.
    ///
    /// `clutch_position` is the current coupling to the gearbox (0 = pressed).
    /// A disengaged clutch lets the engine spin down freely, which shows up as
    /// an additional RPM loss of `(1 - clutch) * rpm * clutch_drag`.
    pub fn update(&mut self, dt: f64, clutch_position: f64) {
        let dt = sanitize_dt(dt);
        let clutch_slip = 1.0 - clamp_unit(clutch_position);
        let rpm_drop = self.rpm * clutch_slip * self.spec.clutch_drag;

        self.update_rpm(dt);
        self.rpm = self.spec.clamp_rpm(self.rpm - rpm_drop);

        self.update_torque();
        self.update_oil_temp(dt);
    }

    fn update_rpm(&mut self, dt: f64) {
        let target = self.spec.target_rpm(self.accelerator_position);
        let noise = self.noise.symmetric(self.spec.rpm_noise);

        self.rpm += (target - self.rpm) * self.spec.inertia * dt + noise;
        self.rpm = self.spec.clamp_rpm(self.rpm);
    }

    /// Recompute torque at the current RPM and throttle, including noise.
    ///
    /// The result is floored at zero.
    pub fn update_torque(&mut self) {
        let torque = self.torque_curve(self.rpm);
        let variation = torque * self.noise.symmetric(self.spec.torque_noise);
        self.torque = (torque + variation).max(0.0);
    }

    /// Noise-free torque at `rpm` for the current throttle position.
    pub fn torque_curve(&self, rpm: f64) -> f64 {
        let spec = &self.spec;
        if spec.max_rpm <= 0.0 {
            return 0.0;
        }

        let rpm_norm = rpm / spec.max_rpm;
        let torque_peak = spec.rpm_at_max_torque / spec.max_rpm;
        let power_peak = spec.rpm_at_max_power / spec.max_rpm;

        let base_curve = (-((rpm_norm - torque_peak) * 2.5).powi(2)).exp();
        let high_drop = (-((rpm_norm - power_peak) * 1.5).powi(2)).exp();
        let idle_factor = 1.0 - (-5.0 * rpm_norm).exp();

        let torque_factor = base_curve * idle_factor * (0.7 + 0.3 * high_drop);
        (torque_factor * spec.max_torque_nm * self.accelerator_position).max(0.0)
    }

    fn update_oil_temp(&mut self, dt: f64) {
        let spec = &self.spec;
        let rpm_fraction = if spec.max_rpm > 0.0 {
            self.rpm / spec.max_rpm
        } else {
            0.0
        };
        let load = 0.3 * rpm_fraction + 0.7 * self.accelerator_position;
        let target = spec.min_oil_temp_c + (spec.max_oil_temp_c - spec.min_oil_temp_c) * load;
        let noise = self.noise.symmetric(spec.oil_temp_noise);

        self.oil_temp += (target - self.oil_temp) * 0.1 * dt + noise;
        self.oil_temp = self.spec.clamp_oil_temp(self.oil_temp);
    }

    pub fn power_kw(&self) -> f64 {
        self.torque * self.rpm / POWER_KW_DIVISOR
    }

    /// Categorical state, checked in priority order.
    pub fn state(&self) -> EngineState {
        let spec = &self.spec;
        if self.rpm < spec.idle_rpm + 50.0 {
            EngineState::LowIdle
        } else if self.rpm >= spec.max_rpm * 0.95 {
            EngineState::RpmLimit
        } else if self.oil_temp >= spec.max_oil_temp_c * 0.9 {
            EngineState::OilTempHigh
        } else {
            EngineState::Normal
        }
    }

    /// Snapshot of the observable engine state.
    pub fn data(&self) -> EngineTelemetry {
        let power_kw = self.power_kw();
        EngineTelemetry {
            rpm: self.rpm,
            torque_nm: self.torque,
            oil_temp_c: self.oil_temp,
            accelerator_position: self.accelerator_position,
            power_kw,
            power_hp: power_kw * KW_TO_HP,
            state: self.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quiet_engine() -> Engine {
        Engine::with_seed(EngineSpec::default().noiseless(), 0)
    }

    #[test]
    fn test_new_engine_idles() {
        let engine = quiet_engine();
        assert_relative_eq!(engine.rpm(), 800.0);
        assert_relative_eq!(engine.oil_temp(), 80.0);
        assert_relative_eq!(engine.accelerator_position(), 0.0);
        assert_eq!(engine.state(), EngineState::LowIdle);
    }

    #[test]
    fn test_accelerator_is_clamped() {
        let mut engine = quiet_engine();
        engine.set_accelerator_position(1.7);
        assert_relative_eq!(engine.accelerator_position(), 1.0);
        engine.set_accelerator_position(-0.2);
        assert_relative_eq!(engine.accelerator_position(), 0.0);
    }

    #[test]
    fn test_rpm_approaches_target_by_inertia() {
        let mut engine = quiet_engine();
        engine.set_accelerator_position(1.0);
        engine.update(0.1, 1.0);
        // 800 + (8500 - 800) * 0.3 * 0.1
        assert_relative_eq!(engine.rpm(), 1031.0, epsilon = 1e-9);
    }

    #[test]
    fn test_disengaged_clutch_drops_rpm_but_not_below_idle() {
        let mut engine = quiet_engine();
        engine.set_rpm(4000.0);
        engine.update(0.1, 0.0);
        // target is idle: 4000 + (800 - 4000) * 0.03 = 3904, minus 10% of 4000
        assert_relative_eq!(engine.rpm(), 3504.0, epsilon = 1e-9);

        for _ in 0..200 {
            engine.update(0.1, 0.0);
        }
        assert_relative_eq!(engine.rpm(), 800.0);
    }

    #[test]
    fn test_closed_throttle_yields_zero_torque() {
        let mut engine = quiet_engine();
        engine.set_rpm(3500.0);
        engine.update_torque();
        assert_relative_eq!(engine.torque(), 0.0);
    }

    #[test]
    fn test_torque_curve_peaks_near_rated_rpm() {
        let mut engine = quiet_engine();
        engine.set_accelerator_position(1.0);
        let at_idle = engine.torque_curve(800.0);
        let at_peak = engine.torque_curve(3500.0);
        let at_redline = engine.torque_curve(8500.0);
        assert!(at_peak > at_idle);
        assert!(at_peak > at_redline);
        assert!(at_peak <= 450.0);
    }

    #[test]
    fn test_rpm_set_is_clamped() {
        let mut engine = quiet_engine();
        engine.set_rpm(20_000.0);
        assert_relative_eq!(engine.rpm(), 8500.0);
        engine.set_rpm(0.0);
        assert_relative_eq!(engine.rpm(), 800.0);
        engine.set_rpm(f64::NAN);
        assert_relative_eq!(engine.rpm(), 800.0);
    }

    #[test]
    fn test_engine_state_thresholds() {
        let mut engine = quiet_engine();
        engine.set_rpm(849.0);
        assert_eq!(engine.state(), EngineState::LowIdle);
        engine.set_rpm(850.0);
        assert_eq!(engine.state(), EngineState::Normal);
        engine.set_rpm(8100.0);
        assert_eq!(engine.state(), EngineState::RpmLimit);
    }

    #[test]
    fn test_oil_temp_high_state() {
        let mut engine = quiet_engine();
        engine.set_accelerator_position(1.0);
        engine.set_rpm(6000.0);
        for _ in 0..2000 {
            engine.update(0.1, 1.0);
            engine.set_rpm(6000.0);
        }
        assert!(engine.oil_temp() >= 108.0);
        assert_eq!(engine.state(), EngineState::OilTempHigh);
    }

    #[test]
    fn test_power_conversion() {
        let mut engine = quiet_engine();
        engine.set_accelerator_position(1.0);
        engine.set_rpm(3500.0);
        engine.update_torque();
        let data = engine.data();
        assert_relative_eq!(
            data.power_kw,
            data.torque_nm * data.rpm / 9549.297,
            epsilon = 1e-9
        );
        assert_relative_eq!(data.power_hp, data.power_kw * 1.341, epsilon = 1e-9);
    }

    #[test]
    fn test_data_is_idempotent() {
        let mut engine = Engine::with_seed(EngineSpec::default(), 11);
        engine.set_accelerator_position(0.6);
        engine.update(0.1, 1.0);
        assert_eq!(engine.data(), engine.data());
    }
}
