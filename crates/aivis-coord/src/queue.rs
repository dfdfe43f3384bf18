//! FIFO work queue of speech requests.

use std::sync::Arc;
use std::time::Duration;

use aivis_core::{KvStore, SpeechRequest};
use tracing::debug;

use crate::CoordError;

/// Producers append to the tail; the elected worker pops from the head.
///
/// A pop consumes the item. There is no acknowledgement, so an item popped
/// by a worker that then dies is gone.
#[derive(Clone)]
pub struct WorkQueue {
    store: Arc<dyn KvStore>,
    key: String,
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue").field("key", &self.key).finish_non_exhaustive()
    }
}

impl WorkQueue {
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append `request`, returning the queue depth after the push.
    pub async fn enqueue(&self, request: &SpeechRequest) -> Result<u64, CoordError> {
        let payload = request
            .to_json()
            .map_err(|e| CoordError::Payload(e.to_string()))?;
        let depth = self.store.push_back(&self.key, &payload).await?;
        debug!(
            queue_len = depth,
            request_id = request.request_id.as_ref().map(|id| id.as_str()),
            "Enqueued speech request"
        );
        Ok(depth)
    }

    /// Pop the head, waiting up to `timeout`. `Ok(None)` on timeout.
    pub async fn dequeue_blocking(
        &self,
        timeout: Duration,
    ) -> Result<Option<SpeechRequest>, CoordError> {
        let Some(raw) = self.store.pop_front_blocking(&self.key, timeout).await? else {
            return Ok(None);
        };
        SpeechRequest::from_json(&raw)
            .map(Some)
            .map_err(|e| CoordError::Payload(e.to_string()))
    }

    pub async fn len(&self) -> Result<u64, CoordError> {
        Ok(self.store.list_len(&self.key).await?)
    }

    pub async fn is_empty(&self) -> Result<bool, CoordError> {
        Ok(self.len().await? == 0)
    }
}
