//! Start gate and cooperative shutdown.

use std::time::Duration;

use tokio::sync::{broadcast, watch};

/// One-shot gate opened when the driver enters the driving phase.
///
/// Waiters that subscribe after the gate opened pass straight through.
#[derive(Debug)]
pub struct StartGate {
    tx: watch::Sender<bool>,
}

impl StartGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn waiter(&self) -> GateWaiter {
        GateWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct GateWaiter {
    rx: watch::Receiver<bool>,
}

impl GateWaiter {
    /// Wait for the gate to open. Returns `false` if the gate was dropped
    /// without ever opening.
    pub async fn wait(&mut self) -> bool {
        self.rx.wait_for(|open| *open).await.is_ok()
    }
}

/// Sending half of the shutdown broadcast. Cloneable; firing it more than
/// once is harmless.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: broadcast::Sender<()>,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown::new(self.tx.subscribe())
    }

    /// Signal every subscribed [`Shutdown`]. Returns `false` when nobody
    /// was listening any more.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// Listens for the shutdown broadcast.
///
/// Once a shutdown has been observed every later call returns immediately.
/// A closed channel (all senders dropped) also counts as shutdown.
#[derive(Debug)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new(notify: broadcast::Receiver<()>) -> Self {
        Self {
            is_shutdown: false,
            notify,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }
        // Lagged can only mean a shutdown was sent.
        let _signal = self.notify.recv().await;
        self.is_shutdown = true;
    }

    /// Sleep for `duration` unless shutdown arrives first.
    ///
    /// Returns `true` when the full duration elapsed.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_shutdown {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = self.recv() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_gate_releases_waiters() {
        let gate = StartGate::new();
        let mut waiter = gate.waiter();
        let task = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!task.is_finished());

        gate.open();
        assert!(gate.is_open());
        assert!(matches!(task.await, Ok(true)));

        let mut late = gate.waiter();
        assert!(late.wait().await);
    }

    #[tokio::test]
    async fn test_dropped_gate_does_not_open() {
        let gate = StartGate::new();
        let mut waiter = gate.waiter();
        drop(gate);
        assert!(!waiter.wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let (tx, rx) = broadcast::channel(1);
        let mut shutdown = Shutdown::new(rx);

        assert!(shutdown.sleep(Duration::from_millis(100)).await);

        let sleeper = tokio::spawn(async move {
            let completed = shutdown.sleep(Duration::from_secs(3600)).await;
            (completed, shutdown.is_shutdown())
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(tx.send(()).is_ok());

        assert!(matches!(sleeper.await, Ok((false, true))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_reaches_every_subscriber() {
        let trigger = ShutdownTrigger::new();
        let mut first = trigger.subscribe();
        let mut second = trigger.subscribe();

        assert!(trigger.fire());
        first.recv().await;
        assert!(!second.sleep(Duration::from_secs(60)).await);
        assert!(first.is_shutdown() && second.is_shutdown());

        drop((first, second));
        assert!(!trigger.fire());
    }

    #[tokio::test]
    async fn test_closed_channel_counts_as_shutdown() {
        let (tx, rx) = broadcast::channel::<()>(1);
        let mut shutdown = Shutdown::new(rx);
        drop(tx);
        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
        assert!(!shutdown.sleep(Duration::from_secs(1)).await);
    }
}
