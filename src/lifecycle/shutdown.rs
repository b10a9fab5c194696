//! Shutdown coordination.
//!
//! The signal is level-triggered: once fired it stays fired, and a receiver
//! created after the fact observes it immediately.

use tokio::sync::watch;

/// Coordinator for shutdown.
///
/// Wraps a watch channel holding a single `bool`. Any number of tasks can
/// subscribe and wait on it at the same time.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `true` only for the call that actually fired it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a [`Shutdown`].
///
/// A dropped coordinator counts as fired, so tasks never outlive their owner.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once the signal has fired (or the coordinator is gone).
    ///
    /// Cancel-safe; meant to be raced inside `tokio::select!`.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    /// Non-blocking check of the signal.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}
