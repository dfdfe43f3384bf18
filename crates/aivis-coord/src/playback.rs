//! Lock serializing render + playback.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use aivis_core::KvStore;
use tracing::{debug, warn};

use crate::CoordError;

/// Lease-shaped lock held for exactly one render + play cycle.
///
/// Unlike the worker lease, acquisition waits: the worker legitimately
/// queues behind its own previous item, so [`acquire`](Self::acquire) polls
/// every `retry` until the key is free. The TTL is generous so a slow
/// synthesis or a long utterance does not lose the lock mid-playback.
#[derive(Clone)]
pub struct PlaybackMutex {
    store: Arc<dyn KvStore>,
    key: String,
    ttl: Duration,
    retry: Duration,
}

impl std::fmt::Debug for PlaybackMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackMutex")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PlaybackMutex {
    pub fn new(
        store: Arc<dyn KvStore>,
        key: impl Into<String>,
        ttl: Duration,
        retry: Duration,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
            retry,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Single attempt.
    pub async fn try_acquire(&self, holder_id: &str) -> Result<Option<PlaybackGuard>, CoordError> {
        if self.store.set_nx(&self.key, holder_id, self.ttl).await? {
            Ok(Some(self.guard(holder_id)))
        } else {
            Ok(None)
        }
    }

    /// Wait until the lock is ours.
    pub async fn acquire(&self, holder_id: &str) -> Result<PlaybackGuard, CoordError> {
        let mut attempts: u32 = 0;
        loop {
            if let Some(guard) = self.try_acquire(holder_id).await? {
                if attempts > 0 {
                    debug!(key = %self.key, attempts, "Playback lock acquired after waiting");
                }
                return Ok(guard);
            }
            attempts = attempts.saturating_add(1);
            tokio::time::sleep(self.retry).await;
        }
    }

    /// Run `work` while holding the lock and release it afterwards, whatever
    /// `work` returned. If the returned future is dropped early the guard's
    /// drop path releases the lock instead.
    pub async fn run_exclusive<F, Fut, T>(&self, holder_id: &str, work: F) -> Result<T, CoordError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire(holder_id).await?;
        let output = work().await;
        if let Err(e) = guard.release().await {
            warn!(error = %e, "Failed to release playback lock; it will expire");
        }
        Ok(output)
    }

    /// Current holder, if any.
    pub async fn holder(&self) -> Result<Option<String>, CoordError> {
        Ok(self.store.get(&self.key).await?)
    }

    fn guard(&self, holder_id: &str) -> PlaybackGuard {
        PlaybackGuard {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            holder_id: holder_id.to_string(),
            released: false,
        }
    }
}

/// Proof of holding the playback lock.
///
/// Call [`release`](Self::release). A guard dropped without it schedules an
/// ownership-checked release on the current runtime; outside a runtime the
/// lock is left to expire.
#[must_use = "the playback lock is held until the guard is released"]
pub struct PlaybackGuard {
    store: Arc<dyn KvStore>,
    key: String,
    holder_id: String,
    released: bool,
}

impl std::fmt::Debug for PlaybackGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackGuard")
            .field("key", &self.key)
            .field("holder_id", &self.holder_id)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl PlaybackGuard {
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Release the lock if we still own it.
    ///
    /// Until the delete has completed the drop path still applies, so a
    /// cancelled or failed release falls back to the deferred one.
    pub async fn release(mut self) -> Result<bool, CoordError> {
        let deleted = self
            .store
            .compare_and_delete(&self.key, &self.holder_id)
            .await?;
        self.released = true;
        Ok(deleted)
    }
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        let holder_id = std::mem::take(&mut self.holder_id);
        handle.spawn(async move {
            if let Err(e) = store.compare_and_delete(&key, &holder_id).await {
                warn!(error = %e, "Deferred playback lock release failed");
            }
        });
    }
}
