//! Static torque-curve sweep.

use serde::{Deserialize, Serialize};

use crate::engine::Engine;

/// Throttle positions swept when none are given.
pub const DEFAULT_SWEEP_THROTTLES: [f64; 4] = [0.25, 0.5, 0.75, 1.0];

/// RPM step used when none is given.
pub const DEFAULT_SWEEP_RPM_STEP: f64 = 100.0;

/// Most samples taken per throttle position.
pub const MAX_SWEEP_POINTS: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorqueCurvePoint {
    pub accelerator_position: f64,
    pub rpm: f64,
    pub torque_nm: f64,
    pub power_kw: f64,
}

/// Evaluate the engine's torque curve over `[idle, max]` RPM for every
/// throttle position.
///
/// RPM is forced with [`Engine::set_rpm`] and torque recomputed with
/// [`Engine::update_torque`], so the RPM dynamics never run. The engine's
/// throttle and RPM are restored afterwards. Returns an empty vector when
/// `rpm_step` is not a positive finite number, or is so small that a
/// throttle position would need more than [`MAX_SWEEP_POINTS`] samples.
pub fn torque_curve_sweep(
    engine: &mut Engine,
    throttles: &[f64],
    rpm_step: f64,
) -> Vec<TorqueCurvePoint> {
    if !rpm_step.is_finite() || rpm_step <= 0.0 {
        return Vec::new();
    }

    let idle = engine.spec().idle_rpm;
    let max = engine.spec().max_rpm;
    if max < idle {
        return Vec::new();
    }
    let span = ((max - idle) / rpm_step).floor();
    #[allow(clippy::cast_precision_loss)]
    let limit = MAX_SWEEP_POINTS as f64;
    if !span.is_finite() || span >= limit {
        return Vec::new();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = span as u64;

    let saved_throttle = engine.accelerator_position();
    let saved_rpm = engine.rpm();

    let mut points = Vec::new();
    for &throttle in throttles {
        engine.set_accelerator_position(throttle);
        for i in 0..=steps {
            #[allow(clippy::cast_precision_loss)]
            let rpm = idle + i as f64 * rpm_step;
            engine.set_rpm(rpm);
            engine.update_torque();
            points.push(TorqueCurvePoint {
                accelerator_position: engine.accelerator_position(),
                rpm: engine.rpm(),
                torque_nm: engine.torque(),
                power_kw: engine.power_kw(),
            });
        }
    }

    engine.set_accelerator_position(saved_throttle);
    engine.set_rpm(saved_rpm);
    engine.update_torque();
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSpec;
    use approx::assert_relative_eq;

    #[test]
    fn test_sweep_covers_idle_to_max() {
        let mut engine = Engine::with_seed(EngineSpec::default().noiseless(), 3);
        let points = torque_curve_sweep(&mut engine, &DEFAULT_SWEEP_THROTTLES, 100.0);

        // 800..=8500 in steps of 100
        assert_eq!(points.len(), 4 * 78);
        let rpm_at = |i: usize| points.get(i).map(|p| p.rpm);
        assert_eq!(rpm_at(0), Some(800.0));
        assert_eq!(rpm_at(77), Some(8500.0));
        assert_eq!(points.get(78).map(|p| p.accelerator_position), Some(0.5));
    }

    #[test]
    fn test_torque_scales_with_throttle() {
        let mut engine = Engine::with_seed(EngineSpec::default().noiseless(), 3);
        let points = torque_curve_sweep(&mut engine, &[0.5, 1.0], 500.0);
        let (lows, highs) = points.split_at(points.len() / 2);
        for (low, high) in lows.iter().zip(highs) {
            assert_relative_eq!(low.rpm, high.rpm);
            assert_relative_eq!(high.torque_nm, 2.0 * low.torque_nm, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_peak_near_rated_torque_rpm() {
        let mut engine = Engine::with_seed(EngineSpec::default().noiseless(), 3);
        let points = torque_curve_sweep(&mut engine, &[1.0], 100.0);
        let peak = points
            .iter()
            .max_by(|a, b| a.torque_nm.total_cmp(&b.torque_nm))
            .map(|p| p.rpm)
            .unwrap_or_default();
        assert!((3000.0..=4500.0).contains(&peak), "peak at {peak}");
    }

    #[test]
    fn test_invalid_step_yields_nothing() {
        let mut engine = Engine::with_seed(EngineSpec::default(), 3);
        assert!(torque_curve_sweep(&mut engine, &[1.0], 0.0).is_empty());
        assert!(torque_curve_sweep(&mut engine, &[1.0], f64::NAN).is_empty());
        assert!(torque_curve_sweep(&mut engine, &[1.0], -100.0).is_empty());
    }

    #[test]
    fn test_oversized_sweep_yields_nothing() {
        let mut engine = Engine::with_seed(EngineSpec::default().noiseless(), 3);
        assert!(torque_curve_sweep(&mut engine, &[1.0], 1e-9).is_empty());
        assert!(torque_curve_sweep(&mut engine, &[1.0], f64::MIN_POSITIVE).is_empty());

        // 7700 rpm span, half-rpm step: 15_401 samples still fit
        let points = torque_curve_sweep(&mut engine, &[1.0], 0.5);
        assert_eq!(points.len(), 15_401);
        assert_relative_eq!(engine.rpm(), EngineSpec::default().idle_rpm);
    }

    #[test]
    fn test_engine_state_restored() {
        let mut engine = Engine::with_seed(EngineSpec::default().noiseless(), 3);
        engine.set_accelerator_position(0.2);
        engine.set_rpm(2500.0);
        let _ = torque_curve_sweep(&mut engine, &DEFAULT_SWEEP_THROTTLES, 250.0);
        assert_relative_eq!(engine.accelerator_position(), 0.2);
        assert_relative_eq!(engine.rpm(), 2500.0);
    }
}
