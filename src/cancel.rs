use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Process-wide cooperative stop signal.
///
/// Workers and the scheduler poll [`is_tripped`](Self::is_tripped) at their
/// checkpoints; sleeps race [`cancelled`](Self::cancelled) so a stop request
/// interrupts an inter-batch delay immediately. Tripping the gate never
/// aborts a provider call already in flight.
#[derive(Debug, Default)]
pub struct CancellationGate {
    tripped: AtomicBool,
    notify: Notify,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent; wakes every pending `cancelled()` future.
    pub fn trip(&self) {
        self.tripped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Resolves once the gate has been tripped.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before the flag check so a trip() between
            // the check and the await is not missed.
            let notified = self.notify.notified();
            if self.is_tripped() {
                return;
            }
            notified.await;
        }
    }
}
