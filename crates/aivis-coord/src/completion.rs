//! Per-request completion rendezvous.

use std::sync::Arc;
use std::time::Duration;

use aivis_core::{KeySpace, KvStore, RequestId};
use tracing::debug;

use crate::CoordError;

const MARKER: &str = "1";

/// How a wait on a completion marker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The worker finished the request.
    Completed,
    /// No marker arrived in time. `processing` reports whether the worker
    /// was still rendering the request when the wait gave up; `false` means
    /// the request is queued, was lost, or its render failed.
    TimedOut { processing: bool },
}

impl CompletionOutcome {
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One-shot markers keyed by request id.
///
/// The worker pushes a marker after playback; the first waiter pops it.
/// Markers expire after `ttl` so nobody waiting never leaks a key.
#[derive(Clone)]
pub struct CompletionSignal {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    ttl: Duration,
}

impl std::fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("keys", &self.keys)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CompletionSignal {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    pub async fn notify(&self, id: &RequestId) -> Result<(), CoordError> {
        self.store
            .push_back_with_expiry(&self.keys.completion(id), MARKER, self.ttl)
            .await?;
        debug!(request_id = %id, "Completion signalled");
        Ok(())
    }

    /// Block until `id` is notified or `timeout` elapses. A timeout is an
    /// outcome, not an error.
    pub async fn await_completion(
        &self,
        id: &RequestId,
        timeout: Duration,
    ) -> Result<CompletionOutcome, CoordError> {
        let popped = self
            .store
            .pop_front_blocking(&self.keys.completion(id), timeout)
            .await?;
        if popped.is_some() {
            return Ok(CompletionOutcome::Completed);
        }
        let processing = self.store.exists(&self.keys.processing(id)).await?;
        Ok(CompletionOutcome::TimedOut { processing })
    }

    /// Record that the worker has dequeued `id` and is working on it.
    pub async fn mark_processing(&self, id: &RequestId, ttl: Duration) -> Result<(), CoordError> {
        self.store
            .set_with_expiry(&self.keys.processing(id), MARKER, ttl)
            .await?;
        Ok(())
    }

    pub async fn clear_processing(&self, id: &RequestId) -> Result<(), CoordError> {
        self.store.delete(&[self.keys.processing(id)]).await?;
        Ok(())
    }
}
