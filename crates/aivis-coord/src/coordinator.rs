use std::sync::Arc;

use aivis_core::{AppConfig, CoordinationTimings, KeySpace, KvStore};

use crate::namespace::{self, NamespaceStatus};
use crate::{CompletionSignal, CoordError, Lease, PlaybackMutex, WorkQueue, lease_present};

/// Builds the coordination primitives for one key space and timing set.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    timings: CoordinationTimings,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("keys", &self.keys)
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace, timings: CoordinationTimings) -> Self {
        Self {
            store,
            keys,
            timings,
        }
    }

    pub fn from_config(store: Arc<dyn KvStore>, config: &AppConfig) -> Self {
        Self::new(store, config.keys.clone(), config.timings)
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub const fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub const fn timings(&self) -> &CoordinationTimings {
        &self.timings
    }

    /// Worker lease tagged with `holder_id`.
    pub fn worker_lease(&self, holder_id: impl Into<String>) -> Lease {
        Lease::new(
            Arc::clone(&self.store),
            self.keys.worker_lease(),
            holder_id,
            self.timings.worker_lease_ttl,
        )
    }

    pub fn queue(&self) -> WorkQueue {
        WorkQueue::new(Arc::clone(&self.store), self.keys.queue())
    }

    pub fn playback(&self) -> PlaybackMutex {
        PlaybackMutex::new(
            Arc::clone(&self.store),
            self.keys.playback_lock(),
            self.timings.playback_lock_ttl,
            self.timings.playback_retry,
        )
    }

    pub fn completion(&self) -> CompletionSignal {
        CompletionSignal::new(
            Arc::clone(&self.store),
            self.keys.clone(),
            self.timings.completion_ttl,
        )
    }

    /// Whether some worker currently holds the lease.
    pub async fn worker_present(&self) -> Result<bool, CoordError> {
        lease_present(self.store.as_ref(), &self.keys.worker_lease()).await
    }

    pub async fn status(&self) -> Result<NamespaceStatus, CoordError> {
        namespace::inspect(self.store.as_ref(), &self.keys).await
    }

    /// Force-clear the whole namespace.
    pub async fn reset(&self) -> Result<u64, CoordError> {
        namespace::clear(self.store.as_ref(), &self.keys).await
    }
}
