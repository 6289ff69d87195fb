//! Cancellable scheduled task
//!
//! A one-shot delayed callback with an explicit handle. Cancelling before
//! the delay elapses guarantees the callback never starts; once it has
//! started it runs to completion, so callbacks must re-check under the
//! tracker lock whether they are still current.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a delayed callback
#[derive(Debug)]
pub struct ScheduledTask {
    id: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `callback` after `delay` unless cancelled first
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(id: u64, delay: Duration, callback: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    tracing::trace!(task_id = id, "Scheduled task cancelled");
                }
                _ = tokio::time::sleep(delay) => callback().await,
            }
        });

        Self { id, token, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fired, cancelled, or panicked
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
