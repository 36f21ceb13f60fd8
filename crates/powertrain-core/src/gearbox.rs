//! Gearbox model with clutch and rotational inertia.
//!
//! The engine never writes into the gearbox directly. The caller reads the
//! engine output and hands it over with [`Gearbox::set_input`] before calling
//! [`Gearbox::update`].

use serde::{Deserialize, Serialize};

use crate::telemetry::GearboxTelemetry;
use crate::{RAD_PER_SEC_TO_RPM, clamp_unit, sanitize_dt};

pub const NEUTRAL_GEAR: u8 = 0;

/// Fraction of torque surviving the transmission.
pub const TRANSMISSION_EFFICIENCY: f64 = 0.92;

/// Fraction of output speed and torque lost per tick while the clutch is open.
pub const DISENGAGED_DECAY: f64 = 0.25;

/// Ratio table and inertia figures of a gearbox.
///
/// Index 0 of `gear_ratios` and `gear_inertias` is neutral and holds `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearboxSpec {
    pub gear_ratios: Vec<f64>,
    pub final_drive: f64,
    /// kg·m²
    pub input_shaft_inertia: f64,
    /// kg·m², one per gear including neutral.
    pub gear_inertias: Vec<f64>,
    /// kg·m²
    pub output_shaft_inertia: f64,
    pub efficiency: f64,
}

impl Default for GearboxSpec {
    fn default() -> Self {
        Self::seven_speed()
    }
}

impl GearboxSpec {
    /// Seven-speed dual-clutch style box (the canonical vehicle gearbox).
    pub fn seven_speed() -> Self {
        Self {
            gear_ratios: vec![0.0, 3.4, 2.75, 1.767, 0.925, 0.705, 0.755, 0.635],
            final_drive: 4.471,
            input_shaft_inertia: 0.1,
            gear_inertias: vec![0.0, 0.015, 0.014, 0.013, 0.012, 0.011, 0.011, 0.010],
            output_shaft_inertia: 0.05,
            efficiency: TRANSMISSION_EFFICIENCY,
        }
    }

    /// Six-speed manual box.
    pub fn six_speed() -> Self {
        Self {
            gear_ratios: vec![0.0, 3.827, 2.359, 1.656, 1.221, 1.0, 0.831],
            final_drive: 3.42,
            input_shaft_inertia: 0.1,
            gear_inertias: vec![0.0, 0.015, 0.014, 0.013, 0.012, 0.011, 0.010],
            output_shaft_inertia: 0.05,
            efficiency: TRANSMISSION_EFFICIENCY,
        }
    }

    /// Highest selectable gear.
    pub fn max_gear(&self) -> u8 {
        u8::try_from(self.gear_ratios.len().saturating_sub(1)).unwrap_or(u8::MAX)
    }

    /// Ratio of `gear`, `None` when out of range.
    pub fn ratio(&self, gear: u8) -> Option<f64> {
        self.gear_ratios.get(usize::from(gear)).copied()
    }

    fn gear_inertia(&self, gear: u8) -> f64 {
        self.gear_inertias
            .get(usize::from(gear))
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gearbox {
    spec: GearboxSpec,
    current_gear: u8,
    /// 0.0 = disengaged, 1.0 = engaged
    clutch_position: f64,

    input_shaft: f64,
    input_shaft_torque: f64,
    output_shaft: f64,
    output_shaft_torque: f64,

    // rad/s²
    input_shaft_acceleration: f64,
    output_shaft_acceleration: f64,
}

impl Gearbox {
    /// Gearbox in neutral with the clutch pressed.
    pub fn new(spec: GearboxSpec) -> Self {
        Self {
            spec,
            current_gear: NEUTRAL_GEAR,
            clutch_position: 0.0,
            input_shaft: 0.0,
            input_shaft_torque: 0.0,
            output_shaft: 0.0,
            output_shaft_torque: 0.0,
            input_shaft_acceleration: 0.0,
            output_shaft_acceleration: 0.0,
        }
    }

    pub fn spec(&self) -> &GearboxSpec {
        &self.spec
    }

    pub fn current_gear(&self) -> u8 {
        self.current_gear
    }

    pub fn max_gears(&self) -> u8 {
        self.spec.max_gear()
    }

    pub fn is_neutral(&self) -> bool {
        self.current_gear == NEUTRAL_GEAR
    }

    pub fn clutch_position(&self) -> f64 {
        self.clutch_position
    }

    pub fn input_shaft(&self) -> f64 {
        self.input_shaft
    }

    pub fn input_shaft_torque(&self) -> f64 {
        self.input_shaft_torque
    }

    pub fn output_shaft(&self) -> f64 {
        self.output_shaft
    }

    pub fn output_shaft_torque(&self) -> f64 {
        self.output_shaft_torque
    }

    /// Set clutch engagement, clamped to `[0, 1]`.
    pub fn set_clutch(&mut self, position: f64) {
        self.clutch_position = clamp_unit(position);
    }

    /// Select `gear` directly. Returns `false` and keeps the current gear when
    /// `gear` is above [`Gearbox::max_gears`].
    pub fn set_gear(&mut self, gear: u8) -> bool {
        if gear <= self.max_gears() {
            self.current_gear = gear;
            true
        } else {
            false
        }
    }

    pub fn shift_up(&mut self) -> bool {
        if self.current_gear < self.max_gears() {
            self.current_gear += 1;
            true
        } else {
            false
        }
    }

    pub fn shift_down(&mut self) -> bool {
        if self.current_gear > NEUTRAL_GEAR {
            self.current_gear -= 1;
            true
        } else {
            false
        }
    }

    /// Engine-side input for the next [`Gearbox::update`].
    pub fn set_input(&mut self, rpm: f64, torque: f64) {
        self.input_shaft = rpm;
        self.input_shaft_torque = torque;
    }

    /// Gear ratio times final drive; `0` in neutral.
    pub fn current_ratio(&self) -> f64 {
        self.spec.ratio(self.current_gear).unwrap_or(0.0) * self.spec.final_drive
    }

    /// Output shaft speed for an input speed, before inertia effects.
    ///
    /// Neutral (or any zero ratio) yields `0` rather than dividing by zero.
    pub fn output_speed_for(&self, input_rpm: f64) -> f64 {
        let ratio = self.current_ratio();
        if self.is_neutral() || ratio == 0.0 || !ratio.is_finite() {
            return 0.0;
        }
        input_rpm / ratio
    }

    /// Torque delivered to the output shaft for a given input torque.
    pub fn output_torque_for(&self, input_torque: f64) -> f64 {
        input_torque * self.current_ratio() * self.spec.efficiency * self.clutch_position
    }

    fn input_shaft_inertia(&self) -> f64 {
        let clutch_effect = self.clutch_position * 0.3;
        self.spec.input_shaft_inertia * (1.0 + clutch_effect)
    }

    fn gear_inertia(&self) -> f64 {
        if self.is_neutral() {
            return 0.0;
        }
        let ratio = self.spec.ratio(self.current_gear).unwrap_or(0.0);
        self.spec.gear_inertia(self.current_gear) * ratio.powi(2)
    }

    fn output_shaft_inertia(&self) -> f64 {
        let load_effect = self.output_shaft_torque.abs() * 0.001;
        self.spec.output_shaft_inertia * (1.0 + load_effect)
    }

    /// Inertia seen by the driveline in the current gear and clutch state.
    pub fn total_inertia(&self) -> f64 {
        self.input_shaft_inertia() + self.gear_inertia() + self.output_shaft_inertia()
    }

    fn update_angular_accelerations(&mut self) {
        let total = self.total_inertia();
        if total > 0.0 {
            self.input_shaft_acceleration = self.input_shaft_torque / total;
            self.output_shaft_acceleration = self.output_shaft_torque / total;
        }
    }

    /// Advance the output shaft by `dt` seconds.
    ///
    /// With the clutch at least partly engaged the output follows the input
    /// through the ratio, plus the integrated inertia term. With the clutch
    /// fully open the output freewheels down by [`DISENGAGED_DECAY`] per tick.
    /// Neutral always produces zero output.
    pub fn update(&mut self, dt: f64) {
        let dt = sanitize_dt(dt);

        if self.is_neutral() {
            self.output_shaft = 0.0;
            self.output_shaft_torque = 0.0;
            self.output_shaft_acceleration = 0.0;
            let total = self.total_inertia();
            if total > 0.0 {
                self.input_shaft_acceleration = self.input_shaft_torque / total;
            }
            return;
        }

        self.update_angular_accelerations();

        if self.clutch_position > 0.0 {
            let base_output = self.output_speed_for(self.input_shaft);
            let inertia_effect = self.output_shaft_acceleration * dt;

            self.output_shaft = base_output + inertia_effect * RAD_PER_SEC_TO_RPM;
            self.output_shaft_torque = self.output_torque_for(self.input_shaft_torque);
        } else {
            let deceleration =
                self.output_shaft * DISENGAGED_DECAY * (1.0 + self.output_shaft_inertia() * 0.1);
            self.output_shaft -= deceleration;
            self.output_shaft_torque -= self.output_shaft_torque * DISENGAGED_DECAY;
        }
    }

    pub fn data(&self) -> GearboxTelemetry {
        GearboxTelemetry {
            current_gear: self.current_gear,
            clutch_position: self.clutch_position,
            input_shaft_rpm: self.input_shaft,
            input_shaft_torque_nm: self.input_shaft_torque,
            output_shaft_rpm: self.output_shaft,
            output_shaft_torque_nm: self.output_shaft_torque,
            input_shaft_acceleration: self.input_shaft_acceleration,
            output_shaft_acceleration: self.output_shaft_acceleration,
        }
    }
}

impl Default for Gearbox {
    fn default() -> Self {
        Self::new(GearboxSpec::default())
    }
}
