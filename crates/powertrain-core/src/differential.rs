//! Open differential splitting one shaft into a left/right wheel pair.

use crate::telemetry::DifferentialTelemetry;

/// Final ratio of the reference rear differential.
pub const TYPE_R_DIFF_RATIO: f64 = 3.84;

/// Differential state. Every field is derived from the last
/// [`Differential::update`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Differential {
    gear_ratio: f64,
    wheel_speed_left: f64,
    wheel_speed_right: f64,
    torque_left: f64,
    torque_right: f64,
    slip_ratio: f64,
}

impl Differential {
    pub fn new(gear_ratio: f64) -> Self {
        Self {
            gear_ratio,
            wheel_speed_left: 0.0,
            wheel_speed_right: 0.0,
            torque_left: 0.0,
            torque_right: 0.0,
            slip_ratio: 0.0,
        }
    }

    pub fn gear_ratio(&self) -> f64 {
        self.gear_ratio
    }

    pub fn wheel_speed_left(&self) -> f64 {
        self.wheel_speed_left
    }

    pub fn wheel_speed_right(&self) -> f64 {
        self.wheel_speed_right
    }

    pub fn torque_left(&self) -> f64 {
        self.torque_left
    }

    pub fn torque_right(&self) -> f64 {
        self.torque_right
    }

    pub fn slip_ratio(&self) -> f64 {
        self.slip_ratio
    }

    /// Split the input shaft into wheel speeds and torques.
    ///
    /// Torque is always split evenly. `slip_ratio` is an external input
    /// (cornering, grip) that widens the right wheel and narrows the left one
    /// symmetrically around the base speed; with zero slip both wheels turn at
    /// exactly the same speed. A non-finite slip ratio is treated as zero.
    pub fn update(&mut self, input_shaft_rpm: f64, input_torque: f64, slip_ratio: f64) {
        let slip_ratio = if slip_ratio.is_finite() { slip_ratio } else { 0.0 };

        let wheel_rpm = if self.gear_ratio > 0.0 {
            input_shaft_rpm / self.gear_ratio
        } else {
            0.0
        };

        self.torque_left = input_torque / 2.0;
        self.torque_right = input_torque / 2.0;

        self.wheel_speed_left = wheel_rpm * (1.0 - slip_ratio / 2.0);
        self.wheel_speed_right = wheel_rpm * (1.0 + slip_ratio / 2.0);

        self.slip_ratio = slip_ratio;
    }

    pub fn data(&self) -> DifferentialTelemetry {
        DifferentialTelemetry {
            wheel_speed_left_rpm: self.wheel_speed_left,
            wheel_speed_right_rpm: self.wheel_speed_right,
            torque_left_nm: self.torque_left,
            torque_right_nm: self.torque_right,
            slip_ratio: self.slip_ratio,
        }
    }
}

impl Default for Differential {
    fn default() -> Self {
        Self::new(TYPE_R_DIFF_RATIO)
    }
}
