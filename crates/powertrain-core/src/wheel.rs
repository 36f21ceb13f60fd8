//! Wheels and the driven wheel pair.

use serde::{Deserialize, Serialize};

use crate::error::PowertrainResult;
use crate::telemetry::WheelTelemetry;
use crate::tire::{TireInfo, TireSize};
use crate::{MS_TO_KMH, MS_TO_MPH, RPM_TO_RAD_PER_SEC};

/// A single wheel with a fixed tire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wheel {
    tire: TireSize,
    speed_rpm: f64,
}

impl Wheel {
    /// Build a wheel from a tire specification such as `245/40R19`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PowertrainError::InvalidTireSpec`] when the
    /// specification is malformed.
    pub fn new(tire_spec: &str) -> PowertrainResult<Self> {
        Ok(Self::from_tire(TireSize::parse(tire_spec)?))
    }

    pub fn from_tire(tire: TireSize) -> Self {
        Self {
            tire,
            speed_rpm: 0.0,
        }
    }

    pub fn tire(&self) -> &TireSize {
        &self.tire
    }

    pub fn tire_info(&self) -> TireInfo {
        self.tire.info()
    }

    pub fn speed_rpm(&self) -> f64 {
        self.speed_rpm
    }

    pub fn set_speed_rpm(&mut self, rpm: f64) {
        self.speed_rpm = rpm;
    }

    /// Linear speed at the tread in m/s.
    pub fn linear_speed_ms(&self) -> f64 {
        self.speed_rpm * RPM_TO_RAD_PER_SEC * self.tire.total_radius_m
    }
}

/// Vehicle speed derived from the average of both driven wheels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleSpeed {
    pub ms: f64,
    pub kmh: f64,
    pub mph: f64,
    /// Average wheel speed in RPM.
    pub wheel_rpm: f64,
}

impl VehicleSpeed {
    pub fn from_ms(ms: f64, wheel_rpm: f64) -> Self {
        Self {
            ms,
            kmh: ms * MS_TO_KMH,
            mph: ms * MS_TO_MPH,
            wheel_rpm,
        }
    }
}

/// Left and right driven wheels sharing one tire size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelPair {
    left: Wheel,
    right: Wheel,
}

impl WheelPair {
    /// # Errors
    ///
    /// Returns [`crate::PowertrainError::InvalidTireSpec`] when the
    /// specification is malformed.
    pub fn new(tire_spec: &str) -> PowertrainResult<Self> {
        Ok(Self::from_tire(TireSize::parse(tire_spec)?))
    }

    pub fn from_tire(tire: TireSize) -> Self {
        Self {
            left: Wheel::from_tire(tire),
            right: Wheel::from_tire(tire),
        }
    }

    pub fn left(&self) -> &Wheel {
        &self.left
    }

    pub fn right(&self) -> &Wheel {
        &self.right
    }

    pub fn update(&mut self, left_rpm: f64, right_rpm: f64) {
        self.left.set_speed_rpm(left_rpm);
        self.right.set_speed_rpm(right_rpm);
    }

    pub fn vehicle_speed(&self) -> VehicleSpeed {
        let ms = (self.left.linear_speed_ms() + self.right.linear_speed_ms()) / 2.0;
        let wheel_rpm = (self.left.speed_rpm() + self.right.speed_rpm()) / 2.0;
        VehicleSpeed::from_ms(ms, wheel_rpm)
    }

    pub fn data(&self) -> WheelTelemetry {
        WheelTelemetry {
            wheel_speed_left_rpm: self.left.speed_rpm(),
            wheel_speed_right_rpm: self.right.speed_rpm(),
            vehicle_speed: self.vehicle_speed(),
            tire: self.left.tire_info(),
        }
    }
}
