//! Two-stage cancellation for in-flight work

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation seen by one item.
///
/// `graceful` fires as soon as shutdown is requested: no new attempt starts,
/// waiting for a slot and backoff sleeps stop. `forced` fires after the grace
/// period and aborts the attempt that is still in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    graceful: CancellationToken,
    forced: CancellationToken,
}

impl CancelSignal {
    /// A signal that never fires unless cancelled by hand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a signal from `parent`. The returned [`Escalation`] fires
    /// `forced` once `grace` has passed after `parent` is cancelled, and stops
    /// doing so when dropped.
    pub fn linked(parent: &CancellationToken, grace: Duration) -> (Self, Escalation) {
        let signal = Self { graceful: parent.child_token(), forced: CancellationToken::new() };

        let graceful = signal.graceful.clone();
        let forced = signal.forced.clone();
        let handle = tokio::spawn(async move {
            graceful.cancelled().await;
            tokio::time::sleep(grace).await;
            debug!(grace_ms = grace.as_millis(), "Grace period over, aborting in-flight calls");
            forced.cancel();
        });

        (signal, Escalation { handle })
    }

    pub fn graceful(&self) -> &CancellationToken {
        &self.graceful
    }

    pub fn forced(&self) -> &CancellationToken {
        &self.forced
    }

    pub fn is_cancelled(&self) -> bool {
        self.graceful.is_cancelled()
    }

    /// Request cancellation. `forced` still waits for escalation, if any.
    pub fn cancel(&self) {
        self.graceful.cancel();
    }
}

/// Aborts the escalation timer on drop.
#[derive(Debug)]
pub struct Escalation {
    handle: JoinHandle<()>,
}

impl Drop for Escalation {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
