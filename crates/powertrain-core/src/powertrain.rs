//! The assembled drivetrain: engine, gearbox, differential and wheels.

use serde::{Deserialize, Serialize};

use crate::differential::{Differential, TYPE_R_DIFF_RATIO};
use crate::engine::{Engine, EngineSpec};
use crate::error::PowertrainResult;
use crate::gearbox::{Gearbox, GearboxSpec};
use crate::noise::Noise;
use crate::telemetry::PowertrainSnapshot;
use crate::tire::TireSize;
use crate::wheel::WheelPair;

/// Tire fitted when no other specification is given.
pub const DEFAULT_TIRE_SPEC: &str = "245/40R19";

/// Everything needed to build a [`Powertrain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowertrainSpec {
    pub engine: EngineSpec,
    pub gearbox: GearboxSpec,
    pub differential_ratio: f64,
    /// `<width>/<aspect_ratio>R<rim_diameter>`, e.g. `245/40R19`.
    pub tire_spec: String,
}

impl Default for PowertrainSpec {
    fn default() -> Self {
        Self {
            engine: EngineSpec::default(),
            gearbox: GearboxSpec::default(),
            differential_ratio: TYPE_R_DIFF_RATIO,
            tire_spec: DEFAULT_TIRE_SPEC.to_string(),
        }
    }
}

/// One vehicle's drivetrain, advanced one tick at a time with
/// [`Powertrain::step`].
#[derive(Debug, Clone)]
pub struct Powertrain {
    engine: Engine,
    gearbox: Gearbox,
    differential: Differential,
    wheels: WheelPair,
    slip_ratio: f64,
}

impl Powertrain {
    /// Build the drivetrain, drawing the engine's noise source from `noise`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PowertrainError::InvalidTireSpec`] when
    /// `spec.tire_spec` is malformed. Nothing else can fail.
    pub fn from_spec(spec: &PowertrainSpec, noise: &mut Noise) -> PowertrainResult<Self> {
        let tire = TireSize::parse(&spec.tire_spec)?;
        Ok(Self::new(
            Engine::new(spec.engine, noise.fork()),
            Gearbox::new(spec.gearbox.clone()),
            Differential::new(spec.differential_ratio),
            WheelPair::from_tire(tire),
        ))
    }

    pub fn new(
        engine: Engine,
        gearbox: Gearbox,
        differential: Differential,
        wheels: WheelPair,
    ) -> Self {
        Self {
            engine,
            gearbox,
            differential,
            wheels,
            slip_ratio: 0.0,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn gearbox(&self) -> &Gearbox {
        &self.gearbox
    }

    pub fn gearbox_mut(&mut self) -> &mut Gearbox {
        &mut self.gearbox
    }

    pub fn differential(&self) -> &Differential {
        &self.differential
    }

    pub fn wheels(&self) -> &WheelPair {
        &self.wheels
    }

    pub fn slip_ratio(&self) -> f64 {
        self.slip_ratio
    }

    /// Slip ratio fed to the differential on every following tick.
    /// Non-finite values are ignored.
    pub fn set_slip_ratio(&mut self, slip_ratio: f64) {
        if slip_ratio.is_finite() {
            self.slip_ratio = slip_ratio;
        }
    }

    /// Advance every component by `dt` seconds.
    ///
    /// The engine is fully advanced before its output reaches the gearbox,
    /// and the gearbox before the differential and wheels.
    pub fn step(&mut self, dt: f64) {
        self.engine.update(dt, self.gearbox.clutch_position());

        self.gearbox.set_input(self.engine.rpm(), self.engine.torque());
        self.gearbox.update(dt);

        self.differential.update(
            self.gearbox.output_shaft(),
            self.gearbox.output_shaft_torque(),
            self.slip_ratio,
        );

        self.wheels.update(
            self.differential.wheel_speed_left(),
            self.differential.wheel_speed_right(),
        );
    }

    pub fn snapshot(&self) -> PowertrainSnapshot {
        PowertrainSnapshot {
            engine: self.engine.data(),
            gearbox: self.gearbox.data(),
            differential: self.differential.data(),
            wheels: self.wheels.data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PowertrainError;
    use approx::assert_relative_eq;

    fn quiet_spec() -> PowertrainSpec {
        PowertrainSpec {
            engine: EngineSpec::default().noiseless(),
            ..PowertrainSpec::default()
        }
    }

    #[test]
    fn test_invalid_tire_prevents_construction() {
        let spec = PowertrainSpec {
            tire_spec: "not-a-tire".to_string(),
            ..PowertrainSpec::default()
        };
        let result = Powertrain::from_spec(&spec, &mut Noise::from_seed(1));
        assert!(matches!(
            result,
            Err(PowertrainError::InvalidTireSpec { .. })
        ));
    }

    #[test]
    fn test_neutral_keeps_wheels_still() -> Result<(), PowertrainError> {
        let mut pt = Powertrain::from_spec(&quiet_spec(), &mut Noise::from_seed(1))?;
        pt.gearbox_mut().set_clutch(1.0);
        pt.engine_mut().set_accelerator_position(1.0);

        for _ in 0..20 {
            pt.step(0.1);
        }

        let snap = pt.snapshot();
        assert!(snap.engine.rpm > 800.0);
        assert_relative_eq!(snap.gearbox.output_shaft_rpm, 0.0);
        assert_relative_eq!(snap.wheels.vehicle_speed.ms, 0.0);
        Ok(())
    }

    #[test]
    fn test_step_propagates_engine_to_wheels() -> Result<(), PowertrainError> {
        let mut pt = Powertrain::from_spec(&quiet_spec(), &mut Noise::from_seed(1))?;
        pt.gearbox_mut().set_gear(1);
        pt.gearbox_mut().set_clutch(1.0);
        pt.engine_mut().set_accelerator_position(0.5);
        pt.step(0.1);

        let snap = pt.snapshot();
        assert_relative_eq!(snap.gearbox.input_shaft_rpm, snap.engine.rpm);
        assert_relative_eq!(snap.gearbox.input_shaft_torque_nm, snap.engine.torque_nm);
        assert_relative_eq!(
            snap.differential.wheel_speed_left_rpm,
            snap.gearbox.output_shaft_rpm / TYPE_R_DIFF_RATIO,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            snap.wheels.wheel_speed_left_rpm,
            snap.differential.wheel_speed_left_rpm
        );
        assert!(snap.wheels.vehicle_speed.ms > 0.0);
        Ok(())
    }

    #[test]
    fn test_slip_ratio_reaches_differential() -> Result<(), PowertrainError> {
        let mut pt = Powertrain::from_spec(&quiet_spec(), &mut Noise::from_seed(1))?;
        pt.gearbox_mut().set_gear(2);
        pt.gearbox_mut().set_clutch(1.0);
        pt.engine_mut().set_accelerator_position(0.4);
        pt.set_slip_ratio(0.1);
        pt.set_slip_ratio(f64::INFINITY);
        pt.step(0.1);

        let snap = pt.snapshot();
        assert_relative_eq!(snap.differential.slip_ratio, 0.1);
        assert!(snap.differential.wheel_speed_right_rpm > snap.differential.wheel_speed_left_rpm);
        Ok(())
    }

    #[test]
    fn test_same_seed_same_trajectory() -> Result<(), PowertrainError> {
        let spec = PowertrainSpec::default();
        let mut a = Powertrain::from_spec(&spec, &mut Noise::from_seed(99))?;
        let mut b = Powertrain::from_spec(&spec, &mut Noise::from_seed(99))?;
        for pt in [&mut a, &mut b] {
            pt.gearbox_mut().set_gear(1);
            pt.gearbox_mut().set_clutch(1.0);
            pt.engine_mut().set_accelerator_position(0.7);
        }
        for _ in 0..50 {
            a.step(0.1);
            b.step(0.1);
        }
        assert_eq!(a.snapshot(), b.snapshot());
        Ok(())
    }
}
