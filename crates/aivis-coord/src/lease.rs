//! Worker election lease.

use std::sync::Arc;
use std::time::Duration;

use aivis_core::KvStore;
use tracing::debug;

use crate::CoordError;

/// An identity-tagged, expiring claim on a key.
///
/// Acquisition is "set if absent with expiry" and is not re-entrant: a
/// holder that already owns the lease gets `false` from a second
/// [`try_acquire`](Self::try_acquire). Renewal and release only touch the
/// key while it still holds this lease's `holder_id`, so a holder whose
/// lease expired and was taken over can never disturb the new owner.
#[derive(Clone)]
pub struct Lease {
    store: Arc<dyn KvStore>,
    key: String,
    holder_id: String,
    ttl: Duration,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.key)
            .field("holder_id", &self.holder_id)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Lease {
    pub fn new(
        store: Arc<dyn KvStore>,
        key: impl Into<String>,
        holder_id: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            holder_id: holder_id.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` iff this call created the lease.
    pub async fn try_acquire(&self) -> Result<bool, CoordError> {
        let acquired = self.store.set_nx(&self.key, &self.holder_id, self.ttl).await?;
        debug!(key = %self.key, holder_id = %self.holder_id, acquired, "Lease acquisition attempt");
        Ok(acquired)
    }

    /// Extend the expiry if we still own the lease.
    ///
    /// `false` means ownership is gone and nothing was changed.
    pub async fn renew(&self) -> Result<bool, CoordError> {
        Ok(self
            .store
            .compare_and_extend(&self.key, &self.holder_id, self.ttl)
            .await?)
    }

    /// Delete the lease if we still own it. A no-op otherwise.
    pub async fn release(&self) -> Result<bool, CoordError> {
        let released = self
            .store
            .compare_and_delete(&self.key, &self.holder_id)
            .await?;
        debug!(key = %self.key, holder_id = %self.holder_id, released, "Lease release");
        Ok(released)
    }

    /// Current holder as recorded in the store.
    pub async fn current_holder(&self) -> Result<Option<String>, CoordError> {
        Ok(self.store.get(&self.key).await?)
    }
}

/// Cheap presence check used by producers deciding whether to spawn a
/// worker. Never acquires.
pub async fn lease_present(store: &dyn KvStore, key: &str) -> Result<bool, CoordError> {
    Ok(store.exists(key).await?)
}
