//! Tire size parsing and geometry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PowertrainError, PowertrainResult};
use crate::{INCH_TO_MM, MM_TO_M};

/// Tire dimensions parsed from a `<width>/<aspect_ratio>R<rim_diameter>`
/// specification such as `245/40R19`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TireSize {
    /// Section width in millimeters.
    pub width_mm: u32,
    /// Sidewall height as a percentage of the width.
    pub aspect_ratio: u32,
    /// Rim diameter in inches.
    pub wheel_diameter_in: u32,
    pub sidewall_height_mm: f64,
    pub total_radius_m: f64,
}

impl TireSize {
    /// Parse a tire specification.
    ///
    /// # Errors
    ///
    /// Returns [`PowertrainError::InvalidTireSpec`] unless `spec` is exactly
    /// `<digits>/<digits>R<digits>`.
    pub fn parse(spec: &str) -> PowertrainResult<Self> {
        let invalid = || PowertrainError::InvalidTireSpec {
            spec: spec.to_string(),
        };

        let (width, rest) = spec.split_once('/').ok_or_else(invalid)?;
        let (aspect_ratio, diameter) = rest.split_once('R').ok_or_else(invalid)?;

        let width = parse_digits(width).ok_or_else(invalid)?;
        let aspect_ratio = parse_digits(aspect_ratio).ok_or_else(invalid)?;
        let wheel_diameter = parse_digits(diameter).ok_or_else(invalid)?;

        Ok(Self::from_dimensions(width, aspect_ratio, wheel_diameter))
    }

    /// Derive the geometry from already validated dimensions.
    pub fn from_dimensions(width_mm: u32, aspect_ratio: u32, wheel_diameter_in: u32) -> Self {
        let sidewall_height_mm = f64::from(width_mm) * f64::from(aspect_ratio) / 100.0;
        let wheel_diameter_mm = f64::from(wheel_diameter_in) * INCH_TO_MM;
        let total_diameter_mm = wheel_diameter_mm + 2.0 * sidewall_height_mm;

        Self {
            width_mm,
            aspect_ratio,
            wheel_diameter_in,
            sidewall_height_mm,
            total_radius_m: total_diameter_mm / 2.0 * MM_TO_M,
        }
    }

    pub fn total_diameter_m(&self) -> f64 {
        self.total_radius_m * 2.0
    }

    pub fn circumference_m(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.total_radius_m
    }

    pub fn info(&self) -> TireInfo {
        TireInfo {
            width_mm: f64::from(self.width_mm),
            aspect_ratio: f64::from(self.aspect_ratio),
            wheel_diameter_in: f64::from(self.wheel_diameter_in),
            sidewall_height_mm: self.sidewall_height_mm,
            total_radius_m: self.total_radius_m,
            circumference_m: self.circumference_m(),
        }
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for TireSize {
    type Err = PowertrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TireSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}R{}",
            self.width_mm, self.aspect_ratio, self.wheel_diameter_in
        )
    }
}

/// Flattened tire geometry carried in wheel telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TireInfo {
    pub width_mm: f64,
    pub aspect_ratio: f64,
    pub wheel_diameter_in: f64,
    pub sidewall_height_mm: f64,
    pub total_radius_m: f64,
    pub circumference_m: f64,
}
