//! Cross-thread shutdown signal.
//!
//! Built on a zero-capacity crossbeam channel that never carries a message:
//! dropping (or triggering) the single `ShutdownHandle` disconnects the channel,
//! and every `Shutdown` clone observes the disconnect at once. Waiting on the
//! signal doubles as an interruptible sleep.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};

/// Owning side of the signal. Triggered explicitly or on drop.
#[derive(Debug)]
pub struct ShutdownHandle {
    _tx: Sender<()>,
}

/// Observing side of the signal. Cheap to clone, one per worker.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Receiver<()>,
}

impl ShutdownHandle {
    /// Request shutdown of every worker holding a matching `Shutdown`.
    pub fn trigger(self) {
        drop(self);
    }
}

impl Shutdown {
    /// Create a fresh, untriggered signal pair.
    pub fn channel() -> (ShutdownHandle, Shutdown) {
        let (tx, rx) = bounded(0);
        (ShutdownHandle { _tx: tx }, Shutdown { rx })
    }

    /// `true` once the handle has been triggered or dropped.
    pub fn is_triggered(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleep for up to `timeout`; returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}
