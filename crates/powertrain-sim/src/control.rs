//! Control intents sent to the tick task.
//!
//! The tick task is the only owner of the [`Powertrain`]. Actuator tasks and
//! external callers never touch it directly; they queue [`ControlIntent`]s
//! that are applied between ticks, one at a time, in arrival order.

use powertrain_core::Powertrain;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::error::{SimError, SimResult};

/// A single write to the powertrain's control inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ControlIntent {
    SetThrottle(f64),
    SetClutch(f64),
    SetGear(u8),
    ShiftUp,
    ShiftDown,
    SetSlipRatio(f64),
}

impl ControlIntent {
    /// Apply the intent. Returns `false` when a gear request was refused
    /// because it was out of range; every other intent always applies.
    pub fn apply(self, powertrain: &mut Powertrain) -> bool {
        let gear_before = powertrain.gearbox().current_gear();
        let applied = match self {
            Self::SetThrottle(position) => {
                powertrain.engine_mut().set_accelerator_position(position);
                true
            }
            Self::SetClutch(position) => {
                powertrain.gearbox_mut().set_clutch(position);
                true
            }
            Self::SetGear(gear) => powertrain.gearbox_mut().set_gear(gear),
            Self::ShiftUp => powertrain.gearbox_mut().shift_up(),
            Self::ShiftDown => powertrain.gearbox_mut().shift_down(),
            Self::SetSlipRatio(slip) => {
                powertrain.set_slip_ratio(slip);
                slip.is_finite()
            }
        };

        let gear_after = powertrain.gearbox().current_gear();
        if gear_after != gear_before {
            info!(from = gear_before, to = gear_after, "Gear changed");
        }
        trace!(intent = ?self, applied, "Applied control intent");
        applied
    }
}

/// Cloneable sending half of the control channel.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlIntent>,
}

impl ControlSender {
    pub(crate) fn new(tx: mpsc::Sender<ControlIntent>) -> Self {
        Self { tx }
    }

    /// Queue an intent, waiting for space when the channel is full.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ControlClosed`] once the tick task has stopped.
    pub async fn send(&self, intent: ControlIntent) -> SimResult<()> {
        self.tx
            .send(intent)
            .await
            .map_err(|_closed| SimError::ControlClosed)
    }

    /// # Errors
    ///
    /// Returns [`SimError::ControlClosed`] once the tick task has stopped.
    pub async fn set_throttle(&self, position: f64) -> SimResult<()> {
        self.send(ControlIntent::SetThrottle(position)).await
    }

    /// # Errors
    ///
    /// Returns [`SimError::ControlClosed`] once the tick task has stopped.
    pub async fn set_clutch(&self, position: f64) -> SimResult<()> {
        self.send(ControlIntent::SetClutch(position)).await
    }

    /// # Errors
    ///
    /// Returns [`SimError::ControlClosed`] once the tick task has stopped.
    pub async fn set_gear(&self, gear: u8) -> SimResult<()> {
        self.send(ControlIntent::SetGear(gear)).await
    }

    /// # Errors
    ///
    /// Returns [`SimError::ControlClosed`] once the tick task has stopped.
    pub async fn shift_up(&self) -> SimResult<()> {
        self.send(ControlIntent::ShiftUp).await
    }

    /// # Errors
    ///
    /// Returns [`SimError::ControlClosed`] once the tick task has stopped.
    pub async fn shift_down(&self) -> SimResult<()> {
        self.send(ControlIntent::ShiftDown).await
    }

    /// # Errors
    ///
    /// Returns [`SimError::ControlClosed`] once the tick task has stopped.
    pub async fn set_slip_ratio(&self, slip_ratio: f64) -> SimResult<()> {
        self.send(ControlIntent::SetSlipRatio(slip_ratio)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
