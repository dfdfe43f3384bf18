//! Lease renewal running alongside the processing loop.

use std::time::Duration;

use aivis_coord::Lease;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Renew `lease` every `interval` until `stop` fires or ownership is gone.
///
/// Ownership counts as gone when the store reports another holder, or when
/// renewals have failed for `ttl - interval`: the next tick would land at or
/// past expiry, when another worker may already hold the key. Either way
/// `lost` is cancelled.
pub(crate) async fn renew_until_lost(
    lease: Lease,
    interval: Duration,
    stop: CancellationToken,
    lost: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_renewed = Instant::now();
    let give_up_after = lease.ttl().saturating_sub(interval);

    loop {
        tokio::select! {
            () = stop.cancelled() => return,
            _ = ticker.tick() => {}
        }

        match lease.renew().await {
            Ok(true) => {
                last_renewed = Instant::now();
                debug!(holder_id = lease.holder_id(), "Lease renewed");
            }
            Ok(false) => {
                warn!(holder_id = lease.holder_id(), "Lease is held by someone else; stopping");
                lost.cancel();
                return;
            }
            Err(e) => {
                let silent_for = last_renewed.elapsed();
                if silent_for >= give_up_after {
                    error!(
                        holder_id = lease.holder_id(),
                        error = %e,
                        ?silent_for,
                        "Lease could not be renewed before expiry; stopping"
                    );
                    lost.cancel();
                    return;
                }
                warn!(holder_id = lease.holder_id(), error = %e, "Lease renewal failed; will retry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use aivis_core::{KvStore, StoreError};
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Store {}

        #[async_trait]
        impl KvStore for Store {
            async fn ping(&self) -> Result<(), StoreError>;
            async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
            async fn exists(&self, key: &str) -> Result<bool, StoreError>;
            async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;
            async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
            async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;
            async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;
            async fn compare_and_extend(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool, StoreError>;
            async fn push_back(&self, key: &str, value: &str) -> Result<u64, StoreError>;
            async fn push_back_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
            async fn pop_front_blocking(&self, key: &str, timeout: Duration) -> Result<Option<String>, StoreError>;
            async fn list_len(&self, key: &str) -> Result<u64, StoreError>;
            async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
        }
    }

    fn lease(store: MockStore) -> Lease {
        Lease::new(Arc::new(store), "t:worker-lock", "w1", Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_store_is_given_up_before_the_key_expires() {
        let mut store = MockStore::new();
        store
            .expect_compare_and_extend()
            .returning(|_, _, _| Err(StoreError::Transport("connection refused".to_string())));

        let lost = CancellationToken::new();
        let started = Instant::now();
        renew_until_lost(
            lease(store),
            Duration::from_secs(2),
            CancellationToken::new(),
            lost.clone(),
        )
        .await;

        assert!(lost.is_cancelled());
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(8) && elapsed < Duration::from_secs(10),
            "{elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn another_holder_ends_renewal_at_once() {
        let mut store = MockStore::new();
        store
            .expect_compare_and_extend()
            .times(1)
            .returning(|_, _, _| Ok(false));

        let lost = CancellationToken::new();
        renew_until_lost(
            lease(store),
            Duration::from_secs(2),
            CancellationToken::new(),
            lost.clone(),
        )
        .await;
        assert!(lost.is_cancelled());
    }
}
