//! Fixed-tick simulation driver.
//!
//! [`Simulation::spawn`] starts three kinds of task:
//!
//! * the tick task, sole owner of the [`Powertrain`], which walks through the
//!   [`DriverPhase`]s and integrates one step per tick;
//! * the actuator tasks, released by the start gate once driving begins;
//! * the reporter task, which turns frames into points for the sink.
//!
//! Control inputs reach the tick task only as [`ControlIntent`]s and are
//! applied between ticks. Frames reach the reporter through a bounded channel
//! with `try_send`, so a slow sink drops telemetry instead of stalling the
//! integration.
//!
//! [`ControlIntent`]: crate::ControlIntent

use std::fmt;

use chrono::{DateTime, Utc};
use powertrain_core::{NEUTRAL_GEAR, Noise, Powertrain, PowertrainSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::actuators::{ramp, run_accelerator_sweep, run_gear_shifter};
use crate::config::SimulationConfig;
use crate::control::{ControlIntent, ControlSender};
use crate::error::{SimError, SimResult};
use crate::gate::{Shutdown, ShutdownTrigger, StartGate};
use crate::sink::{ReporterStats, TelemetrySink, run_reporter};

/// Driver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    /// Throttle closed, clutch pressed, neutral.
    Idling,
    /// Initial gear selected, clutch being released.
    Engaging,
    /// Steady state; actuators running.
    Driving,
}

impl DriverPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idling => "idling",
            Self::Engaging => "engaging",
            Self::Driving => "driving",
        }
    }
}

impl fmt::Display for DriverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the powertrain after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationFrame {
    /// Ticks since start, counting every phase. `0` before the first tick.
    pub tick: u64,
    pub phase: DriverPhase,
    pub timestamp: DateTime<Utc>,
    pub powertrain: PowertrainSnapshot,
}

impl SimulationFrame {
    fn now(tick: u64, phase: DriverPhase, powertrain: PowertrainSnapshot) -> Self {
        Self {
            tick,
            phase,
            timestamp: Utc::now(),
            powertrain,
        }
    }
}

/// Outcome of a finished simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub driving_ticks: u64,
    pub final_frame: SimulationFrame,
    /// Points accepted by the sink; a tick yields more than one under
    /// [`crate::PointLayout::PerComponent`].
    pub points_written: u64,
    /// Frames discarded because the reporter was behind.
    pub points_dropped: u64,
    pub sink_failures: u64,
}

/// A validated configuration plus the powertrain built from it.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    powertrain: Powertrain,
}

impl Simulation {
    /// Validate `config` and build the powertrain.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] for any invalid parameter, including a
    /// malformed tire specification.
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;

        let mut noise = match config.seed {
            Some(seed) => Noise::from_seed(seed),
            None => Noise::from_entropy(),
        };
        let mut powertrain = Powertrain::from_spec(&config.powertrain, &mut noise)?;
        powertrain.set_slip_ratio(config.slip_ratio);

        Ok(Self { config, powertrain })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn powertrain(&self) -> &Powertrain {
        &self.powertrain
    }

    /// Start every task on the current Tokio runtime.
    pub fn spawn<S>(self, sink: S) -> SimulationHandle
    where
        S: TelemetrySink + 'static,
    {
        let Self { config, powertrain } = self;

        let (control_tx, control_rx) = mpsc::channel(config.control_buffer);
        let (report_tx, report_rx) = mpsc::channel(config.telemetry_buffer);
        let (frame_tx, frame_rx) = watch::channel(SimulationFrame::now(
            0,
            DriverPhase::Idling,
            powertrain.snapshot(),
        ));
        let shutdown = ShutdownTrigger::new();
        let gate = StartGate::new();
        let controls = ControlSender::new(control_tx);

        let mut actuator_tasks = Vec::new();
        if config.accelerator.enabled {
            actuator_tasks.push(tokio::spawn(run_accelerator_sweep(
                config.accelerator.clone(),
                controls.clone(),
                gate.waiter(),
                shutdown.subscribe(),
            )));
        }
        if config.gear_shift.enabled {
            actuator_tasks.push(tokio::spawn(run_gear_shifter(
                config.gear_shift.clone(),
                powertrain.gearbox().max_gears(),
                controls.clone(),
                frame_rx.clone(),
                gate.waiter(),
                shutdown.subscribe(),
            )));
        }

        let reporter_task = tokio::spawn(run_reporter(
            report_rx,
            sink,
            config.simulation_id.clone(),
            config.point_layout,
        ));

        let tick_loop = TickLoop {
            shutdown: shutdown.subscribe(),
            shutdown_trigger: shutdown.clone(),
            config,
            powertrain,
            controls: control_rx,
            frames: frame_tx,
            reports: report_tx,
            gate,
            tick: 0,
            driving_ticks: 0,
            points_dropped: 0,
        };
        let tick_task = tokio::spawn(tick_loop.run());

        SimulationHandle {
            controls,
            frames: frame_rx,
            shutdown,
            tick_task,
            actuator_tasks,
            reporter_task,
        }
    }

    /// Spawn, then wait for the simulation to stop on its own
    /// (`max_ticks`) or through the returned handle's trigger.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TaskFailed`] if a task panicked.
    pub async fn run<S>(self, sink: S) -> SimResult<SimulationSummary>
    where
        S: TelemetrySink + 'static,
    {
        self.spawn(sink).join().await
    }
}

/// Handle to a running simulation.
#[derive(Debug)]
pub struct SimulationHandle {
    controls: ControlSender,
    frames: watch::Receiver<SimulationFrame>,
    shutdown: ShutdownTrigger,
    tick_task: JoinHandle<TickOutcome>,
    actuator_tasks: Vec<JoinHandle<()>>,
    reporter_task: JoinHandle<ReporterStats>,
}

impl SimulationHandle {
    /// Sender for external control intents.
    pub fn controls(&self) -> ControlSender {
        self.controls.clone()
    }

    /// Receiver that always holds the most recent frame.
    pub fn subscribe(&self) -> watch::Receiver<SimulationFrame> {
        self.frames.clone()
    }

    pub fn latest(&self) -> SimulationFrame {
        self.frames.borrow().clone()
    }

    /// Trigger that stops every task when fired. Can be moved into a
    /// signal handler.
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    /// Ask every task to stop after its current step.
    pub fn shutdown(&self) {
        if !self.shutdown.fire() {
            debug!("Shutdown requested after simulation already stopped");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tick_task.is_finished()
    }

    /// Wait for every task to finish and collect the summary.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TaskFailed`] if any task panicked or was aborted.
    pub async fn join(self) -> SimResult<SimulationSummary> {
        let outcome = self
            .tick_task
            .await
            .map_err(|e| SimError::TaskFailed(format!("tick task: {e}")))?;

        for task in self.actuator_tasks {
            task.await
                .map_err(|e| SimError::TaskFailed(format!("actuator task: {e}")))?;
        }

        let stats = self
            .reporter_task
            .await
            .map_err(|e| SimError::TaskFailed(format!("reporter task: {e}")))?;

        Ok(SimulationSummary {
            ticks: outcome.ticks,
            driving_ticks: outcome.driving_ticks,
            final_frame: outcome.final_frame,
            points_written: stats.points_written,
            points_dropped: outcome.points_dropped,
            sink_failures: stats.sink_failures,
        })
    }
}

#[derive(Debug)]
struct TickOutcome {
    ticks: u64,
    driving_ticks: u64,
    final_frame: SimulationFrame,
    points_dropped: u64,
}

struct TickLoop {
    config: SimulationConfig,
    powertrain: Powertrain,
    controls: mpsc::Receiver<ControlIntent>,
    frames: watch::Sender<SimulationFrame>,
    reports: mpsc::Sender<SimulationFrame>,
    gate: StartGate,
    shutdown: Shutdown,
    shutdown_trigger: ShutdownTrigger,
    tick: u64,
    driving_ticks: u64,
    points_dropped: u64,
}

impl TickLoop {
    async fn run(mut self) -> TickOutcome {
        let mut interval = tokio::time::interval(self.config.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            simulation = %self.config.simulation_id,
            warm_up_ms = self.config.warm_up_ms,
            "Initializing engine at idle"
        );
        self.powertrain.engine_mut().set_accelerator_position(0.0);
        self.powertrain.gearbox_mut().set_clutch(0.0);
        self.powertrain.gearbox_mut().set_gear(NEUTRAL_GEAR);

        if self.drive(&mut interval).await {
            info!(ticks = self.tick, "Simulation stopped by shutdown");
        } else {
            info!(
                ticks = self.tick,
                driving_ticks = self.driving_ticks,
                "Simulation reached its tick limit"
            );
        }
        self.finish()
    }

    /// Run every phase. Returns `true` when stopped by shutdown.
    async fn drive(&mut self, interval: &mut Interval) -> bool {
        for _ in 0..self.config.warm_up_ticks() {
            if !self.tick(interval, DriverPhase::Idling).await {
                return true;
            }
        }

        let gear = self.config.initial_gear;
        info!(gear, "Engaging gear");
        self.powertrain.gearbox_mut().set_gear(gear);
        for position in ramp(0.0, 1.0, self.config.clutch_engage_step)
            .into_iter()
            .skip(1)
        {
            self.powertrain.gearbox_mut().set_clutch(position);
            if !self.tick(interval, DriverPhase::Engaging).await {
                return true;
            }
        }

        info!(
            rpm = self.powertrain.engine().rpm().round(),
            gear = self.powertrain.gearbox().current_gear(),
            "Initial state established, driving"
        );
        self.gate.open();

        loop {
            if self
                .config
                .max_ticks
                .is_some_and(|max| self.driving_ticks >= max)
            {
                return false;
            }
            if !self.tick(interval, DriverPhase::Driving).await {
                return true;
            }
            self.driving_ticks += 1;
        }
    }

    /// Wait for the next tick and advance one step. Returns `false` on
    /// shutdown.
    async fn tick(&mut self, interval: &mut Interval, phase: DriverPhase) -> bool {
        tokio::select! {
            _ = interval.tick() => {}
            () = self.shutdown.recv() => return false,
        }

        if phase == DriverPhase::Driving {
            self.apply_pending_controls();
        }

        self.powertrain.step(self.config.dt);
        self.tick += 1;

        let frame = SimulationFrame::now(self.tick, phase, self.powertrain.snapshot());
        let snapshot = &frame.powertrain;
        debug!(
            tick = self.tick,
            phase = %phase,
            rpm = snapshot.engine.rpm.round(),
            torque = snapshot.engine.torque_nm,
            gear = snapshot.gearbox.current_gear,
            clutch = snapshot.gearbox.clutch_position,
            speed_kmh = snapshot.wheels.vehicle_speed.kmh,
            "Tick"
        );

        self.frames.send_replace(frame.clone());
        self.report(frame);
        true
    }

    fn apply_pending_controls(&mut self) {
        while let Ok(intent) = self.controls.try_recv() {
            if !intent.apply(&mut self.powertrain) {
                debug!(intent = ?intent, tick = self.tick, "Control intent refused");
            }
        }
    }

    fn report(&mut self, frame: SimulationFrame) {
        match self.reports.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.points_dropped += 1;
                if self.points_dropped == 1 || self.points_dropped.is_power_of_two() {
                    warn!(
                        tick = frame.tick,
                        dropped = self.points_dropped,
                        "Telemetry reporter is behind, dropping frames"
                    );
                }
            }
            Err(TrySendError::Closed(_)) => {
                self.points_dropped += 1;
            }
        }
    }

    fn finish(self) -> TickOutcome {
        if !self.shutdown_trigger.fire() {
            debug!("No actuator left to stop");
        }
        let final_frame = self.frames.borrow().clone();
        TickOutcome {
            ticks: self.tick,
            driving_ticks: self.driving_ticks,
            final_frame,
            points_dropped: self.points_dropped,
        }
    }
}
