//! Whole-namespace inspection and reset.

use aivis_core::{KeySpace, KvStore};
use tracing::info;

use crate::CoordError;

/// Snapshot of the shared coordination state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceStatus {
    /// Holder id recorded in the worker lease.
    pub worker_holder: Option<String>,
    pub queue_depth: u64,
    /// Holder id recorded in the playback lock.
    pub playback_holder: Option<String>,
}

impl NamespaceStatus {
    pub const fn worker_active(&self) -> bool {
        self.worker_holder.is_some()
    }

    pub const fn playing(&self) -> bool {
        self.playback_holder.is_some()
    }
}

pub async fn inspect(store: &dyn KvStore, keys: &KeySpace) -> Result<NamespaceStatus, CoordError> {
    Ok(NamespaceStatus {
        worker_holder: store.get(&keys.worker_lease()).await?,
        queue_depth: store.list_len(&keys.queue()).await?,
        playback_holder: store.get(&keys.playback_lock()).await?,
    })
}

/// Every key currently under the prefix.
pub async fn list_keys(store: &dyn KvStore, keys: &KeySpace) -> Result<Vec<String>, CoordError> {
    Ok(store.keys_with_prefix(&keys.namespace()).await?)
}

/// Delete every key under the prefix: queue, both locks and any markers.
///
/// Ownership checks do not apply. Returns the number of keys removed.
pub async fn clear(store: &dyn KvStore, keys: &KeySpace) -> Result<u64, CoordError> {
    let found = list_keys(store, keys).await?;
    let removed = store.delete(&found).await?;
    info!(prefix = keys.prefix(), removed, "Cleared coordination namespace");
    Ok(removed)
}
