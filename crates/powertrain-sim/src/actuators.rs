//! Actuator tasks: accelerator sweep and automatic gear shifting.
//!
//! Both tasks wait on the [`GateWaiter`] before their first write and stop on
//! shutdown or when the control channel closes. They only ever talk to the
//! powertrain through [`ControlSender`].

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::{AcceleratorSweepConfig, GearShiftConfig};
use crate::control::{ControlIntent, ControlSender};
use crate::driver::SimulationFrame;
use crate::gate::{GateWaiter, Shutdown};

/// Upper bound on the number of steps in one [`ramp`].
pub const MAX_RAMP_STEPS: u32 = 1000;

/// Values from `from` to `to` (both included) in equal steps no larger
/// than `step`. The last value is exactly `to`.
///
/// An invalid `step` (not positive or not finite) jumps straight to `to`.
/// A step so small that the ramp would exceed [`MAX_RAMP_STEPS`] steps is
/// widened to fit.
pub fn ramp(from: f64, to: f64, step: f64) -> Vec<f64> {
    if !(step.is_finite() && step > 0.0) || !from.is_finite() || !to.is_finite() {
        return vec![to];
    }

    let distance = (to - from).abs();
    // Guards against 1.0 / 0.05 landing a hair above 20.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = ((distance / step) - 1e-9)
        .ceil()
        .clamp(1.0, f64::from(MAX_RAMP_STEPS)) as u32;

    let mut values: Vec<f64> = (0..steps)
        .map(|i| from + (to - from) * f64::from(i) / f64::from(steps))
        .collect();
    values.push(to);
    values
}

/// What the gear-shift logic decides for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDecision {
    Up(u8),
    Down(u8),
    Hold,
}

/// Pick a target gear from the current RPM and gear.
pub fn decide_shift(config: &GearShiftConfig, rpm: f64, gear: u8, max_gear: u8) -> ShiftDecision {
    if rpm > config.upshift_rpm && gear < max_gear {
        ShiftDecision::Up(gear + 1)
    } else if rpm < config.downshift_rpm && gear > config.lowest_gear {
        ShiftDecision::Down(gear - 1)
    } else {
        ShiftDecision::Hold
    }
}

/// Cycle the throttle 0 → 1 → 0 until shutdown.
pub async fn run_accelerator_sweep(
    config: AcceleratorSweepConfig,
    controls: ControlSender,
    mut gate: GateWaiter,
    mut shutdown: Shutdown,
) {
    tokio::select! {
        opened = gate.wait() => if !opened { return },
        () = shutdown.recv() => return,
    }
    debug!("Accelerator sweep started");

    if !shutdown.sleep(config.initial_delay()).await {
        return;
    }

    let rising = ramp(0.0, 1.0, config.increment);
    let falling = ramp(1.0, 0.0, config.increment);

    loop {
        for ramp_values in [&rising, &falling] {
            for &position in ramp_values {
                if controls.set_throttle(position).await.is_err() {
                    return;
                }
                if !shutdown.sleep(config.step_delay()).await {
                    return;
                }
            }
            if !shutdown.sleep(config.hold()).await {
                return;
            }
        }
    }
}

/// Poll RPM and gear, shifting up or down when a threshold is crossed.
pub async fn run_gear_shifter(
    config: GearShiftConfig,
    max_gear: u8,
    controls: ControlSender,
    frames: watch::Receiver<SimulationFrame>,
    mut gate: GateWaiter,
    mut shutdown: Shutdown,
) {
    tokio::select! {
        opened = gate.wait() => if !opened { return },
        () = shutdown.recv() => return,
    }
    debug!("Gear shifter started");

    if !shutdown.sleep(config.initial_delay()).await {
        return;
    }

    loop {
        let (rpm, gear, throttle) = {
            let frame = frames.borrow();
            let snapshot = &frame.powertrain;
            (
                snapshot.engine.rpm,
                snapshot.gearbox.current_gear,
                snapshot.engine.accelerator_position,
            )
        };

        let target = match decide_shift(&config, rpm, gear, max_gear) {
            ShiftDecision::Up(target) | ShiftDecision::Down(target) => Some(target),
            ShiftDecision::Hold => None,
        };

        if let Some(target) = target {
            info!(rpm = rpm.round(), from = gear, to = target, "Shifting");
            if !perform_shift(&config, &controls, &mut shutdown, target, throttle).await {
                return;
            }
        }

        if !shutdown.sleep(config.poll_interval()).await {
            return;
        }
    }
}

/// Lift, clutch in, change gear, release the clutch in steps, restore the
/// throttle. Returns `false` if interrupted by shutdown or a closed channel.
async fn perform_shift(
    config: &GearShiftConfig,
    controls: &ControlSender,
    shutdown: &mut Shutdown,
    target_gear: u8,
    restore_throttle: f64,
) -> bool {
    if controls
        .send(ControlIntent::SetThrottle(config.shift_throttle))
        .await
        .is_err()
        || !shutdown.sleep(config.throttle_lift()).await
    {
        return false;
    }

    if controls.set_clutch(0.0).await.is_err() || !shutdown.sleep(config.clutch_press()).await {
        return false;
    }

    if controls.set_gear(target_gear).await.is_err()
        || !shutdown.sleep(config.gear_change()).await
    {
        return false;
    }

    for position in ramp(0.0, 1.0, config.clutch_step).into_iter().skip(1) {
        if controls.set_clutch(position).await.is_err()
            || !shutdown.sleep(config.clutch_step_delay()).await
        {
            return false;
        }
    }

    controls.set_throttle(restore_throttle).await.is_ok()
}
