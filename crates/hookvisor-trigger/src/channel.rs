//! Control channels between the HTTP side and the supervisor.
//!
//! The trigger channel holds at most one pending restart. Sending never
//! blocks: when the slot is already full the new trigger is folded into the
//! pending one, so a burst of pushes produces a single restart.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Result of offering a trigger to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The slot was empty; a restart is now pending.
    Queued,
    /// A restart was already pending; this trigger folded into it.
    Coalesced,
    /// The supervisor is gone or shutting down.
    Closed,
}

/// Create the single-slot trigger channel.
///
/// The receiver belongs to the supervisor; senders are cheap to clone and
/// are handed to request handlers.
pub fn trigger_channel() -> (TriggerSender, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (TriggerSender { tx }, TriggerReceiver { rx })
}

/// Sending half of the trigger channel.
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<()>,
}

impl TriggerSender {
    /// Offer a restart without waiting.
    pub fn fire(&self) -> TriggerOutcome {
        match self.tx.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(TrySendError::Full(())) => TriggerOutcome::Coalesced,
            Err(TrySendError::Closed(())) => TriggerOutcome::Closed,
        }
    }
}

/// Receiving half of the trigger channel, owned by the supervisor.
#[derive(Debug)]
pub struct TriggerReceiver {
    rx: mpsc::Receiver<()>,
}

impl TriggerReceiver {
    /// Wait for the next restart request.
    ///
    /// Returns `false` once the channel is closed and empty (every sender
    /// dropped, or [`close`](Self::close) was called).
    pub async fn recv(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Take a pending restart request, if any, without waiting.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Refuse further triggers. A trigger already pending stays receivable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Process-wide "shut down and do not restart" signal.
///
/// Clones share the same state. [`shutdown`](Self::shutdown) may be called
/// any number of times from any task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the signal. Returns `true` only for the call that closed it.
    pub fn shutdown(&self) -> bool {
        let first = !self.token.is_cancelled();
        self.token.cancel();
        first
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal is closed.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Owned future resolving on shutdown, for APIs that need `'static`.
    pub fn wait_owned(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        self.token.clone().cancelled_owned()
    }
}
