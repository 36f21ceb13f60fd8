//! Property-based tests for the powertrain models.
//!
//! Covers the clamping invariants, the torque floor, neutral-gear isolation and
//! the exact symmetry of the differential at zero slip.

use powertrain_core::{
    Differential, Engine, EngineSpec, Gearbox, GearboxSpec, NEUTRAL_GEAR, Noise, Powertrain,
    PowertrainSpec, clamp_unit,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(500))]

    // -- Differential ----------------------------------------------------------

    /// With zero slip both wheels must turn at bit-identical speeds.
    #[test]
    fn prop_zero_slip_wheels_equal(
        input_rpm in -20_000.0f64..20_000.0,
        input_torque in -5_000.0f64..5_000.0,
        ratio in 0.5f64..10.0,
    ) {
        let mut diff = Differential::new(ratio);
        diff.update(input_rpm, input_torque, 0.0);
        prop_assert_eq!(
            diff.wheel_speed_left().to_bits(),
            diff.wheel_speed_right().to_bits()
        );
    }

    /// Torque is split evenly for any slip ratio.
    #[test]
    fn prop_torque_split_even(
        input_torque in -5_000.0f64..5_000.0,
        slip in -1.0f64..1.0,
    ) {
        let mut diff = Differential::default();
        diff.update(3000.0, input_torque, slip);
        prop_assert!((diff.torque_left() - diff.torque_right()).abs() < 1e-9);
        prop_assert!((diff.torque_left() + diff.torque_right() - input_torque).abs() < 1e-6);
    }

    // -- Engine ----------------------------------------------------------------

    /// Torque stays non-negative after noise for every throttle and RPM.
    #[test]
    fn prop_torque_floor(
        throttle in 0.0f64..=1.0,
        rpm in 800.0f64..=8500.0,
        seed: u64,
    ) {
        let mut engine = Engine::with_seed(EngineSpec::default(), seed);
        engine.set_accelerator_position(throttle);
        engine.set_rpm(rpm);
        engine.update_torque();
        prop_assert!(engine.torque() >= 0.0, "torque {} at rpm {} throttle {}", engine.torque(), rpm, throttle);
    }

    /// RPM and oil temperature stay inside their limits for any inputs.
    #[test]
    fn prop_engine_state_bounded(
        throttle in -2.0f64..3.0,
        clutch in -2.0f64..3.0,
        dt in 0.0f64..1.0,
        ticks in 1usize..200,
        seed: u64,
    ) {
        let spec = EngineSpec::default();
        let mut engine = Engine::with_seed(spec, seed);
        engine.set_accelerator_position(throttle);
        for _ in 0..ticks {
            engine.update(dt, clutch);
            prop_assert!(engine.rpm() >= spec.idle_rpm && engine.rpm() <= spec.max_rpm);
            prop_assert!(
                engine.oil_temp() >= spec.min_oil_temp_c && engine.oil_temp() <= spec.max_oil_temp_c
            );
            prop_assert!(engine.torque() >= 0.0);
        }
    }

    /// Throttle writes are clamped to [0, 1].
    #[test]
    fn prop_throttle_clamped(position in proptest::num::f64::ANY) {
        let mut engine = Engine::with_seed(EngineSpec::default(), 0);
        engine.set_accelerator_position(position);
        let stored = engine.accelerator_position();
        prop_assert!((0.0..=1.0).contains(&stored));
        prop_assert!((stored - clamp_unit(position)).abs() < f64::EPSILON);
    }

    // -- Gearbox ---------------------------------------------------------------

    /// Neutral yields zero output whatever the input shaft or clutch does.
    #[test]
    fn prop_neutral_zero_output(
        input_rpm in -20_000.0f64..20_000.0,
        input_torque in -5_000.0f64..5_000.0,
        clutch in -1.0f64..2.0,
        ticks in 1usize..20,
    ) {
        let mut gearbox = Gearbox::default();
        gearbox.set_clutch(clutch);
        for _ in 0..ticks {
            gearbox.set_input(input_rpm, input_torque);
            gearbox.update(0.1);
            prop_assert_eq!(gearbox.current_gear(), NEUTRAL_GEAR);
            prop_assert!(gearbox.output_shaft().abs() < f64::EPSILON);
            prop_assert!(gearbox.output_shaft_torque().abs() < f64::EPSILON);
        }
    }

    /// Clutch writes are clamped to [0, 1].
    #[test]
    fn prop_clutch_clamped(position in proptest::num::f64::ANY) {
        let mut gearbox = Gearbox::default();
        gearbox.set_clutch(position);
        prop_assert!((0.0..=1.0).contains(&gearbox.clutch_position()));
    }

    /// Any sequence of shift requests keeps the gear inside [0, max].
    #[test]
    fn prop_gear_always_in_range(ops in proptest::collection::vec(0u8..3, 0..64), target: u8) {
        let mut gearbox = Gearbox::new(GearboxSpec::seven_speed());
        for op in ops {
            let before = gearbox.current_gear();
            let changed = match op {
                0 => gearbox.shift_up(),
                1 => gearbox.shift_down(),
                _ => gearbox.set_gear(target),
            };
            prop_assert!(gearbox.current_gear() <= gearbox.max_gears());
            if !changed {
                prop_assert_eq!(gearbox.current_gear(), before);
            }
        }
    }

    // -- Whole powertrain --------------------------------------------------------

    /// Two snapshots without an intervening step are identical.
    #[test]
    fn prop_snapshot_idempotent(seed: u64, ticks in 0usize..50, throttle in 0.0f64..=1.0) {
        let mut pt = Powertrain::from_spec(&PowertrainSpec::default(), &mut Noise::from_seed(seed))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        pt.gearbox_mut().set_gear(1);
        pt.gearbox_mut().set_clutch(1.0);
        pt.engine_mut().set_accelerator_position(throttle);
        for _ in 0..ticks {
            pt.step(0.1);
        }
        prop_assert_eq!(pt.snapshot(), pt.snapshot());
    }
}
