//! Protocol properties exercised against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use aivis_coord::{CompletionOutcome, CoordError, Coordinator, Lease, PlaybackMutex, namespace};
use aivis_core::{CoordinationTimings, KeySpace, KvStore, RequestId, SpeechRequest, StoreError};
use aivis_store::MemoryStore;
use async_trait::async_trait;
use futures_util::future::join_all;

fn coordinator() -> (Arc<MemoryStore>, Coordinator) {
    let store = Arc::new(MemoryStore::new());
    let timings = CoordinationTimings {
        playback_retry: Duration::from_millis(10),
        ..CoordinationTimings::default()
    };
    let coord = Coordinator::new(
        Arc::clone(&store) as Arc<dyn KvStore>,
        KeySpace::new("test"),
        timings,
    );
    (store, coord)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_concurrent_acquirer_wins() {
    let (_, coord) = coordinator();

    let attempts = (0..16).map(|i| {
        let lease = coord.worker_lease(format!("holder-{i}"));
        tokio::spawn(async move { lease.try_acquire().await })
    });
    let results = join_all(attempts).await;

    let winners = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert!(coord.worker_present().await.unwrap());
}

#[tokio::test]
async fn acquisition_is_not_reentrant() {
    let (_, coord) = coordinator();
    let lease = coord.worker_lease("a");
    assert!(lease.try_acquire().await.unwrap());
    assert!(!lease.try_acquire().await.unwrap());
}

#[tokio::test]
async fn stale_holder_cannot_renew_or_release() {
    let (store, _) = coordinator();
    let store: Arc<dyn KvStore> = store;
    let old = Lease::new(Arc::clone(&store), "test:lock", "old", Duration::from_millis(100));
    let new = Lease::new(Arc::clone(&store), "test:lock", "new", Duration::from_secs(5));

    assert!(old.try_acquire().await.unwrap());
    assert!(old.renew().await.unwrap());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(new.try_acquire().await.unwrap());

    assert!(!old.renew().await.unwrap());
    assert!(!old.release().await.unwrap());
    assert_eq!(new.current_holder().await.unwrap().as_deref(), Some("new"));
    assert!(new.release().await.unwrap());
    assert!(new.current_holder().await.unwrap().is_none());
}

#[tokio::test]
async fn expired_lease_can_be_taken_over() {
    let (store, _) = coordinator();
    let store: Arc<dyn KvStore> = store;
    let first = Lease::new(Arc::clone(&store), "test:lock", "first", Duration::from_millis(200));
    let second = Lease::new(Arc::clone(&store), "test:lock", "second", Duration::from_secs(5));

    assert!(first.try_acquire().await.unwrap());
    assert!(!second.try_acquire().await.unwrap());
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(second.try_acquire().await.unwrap());
}

#[tokio::test]
async fn queue_preserves_fifo_order_across_producers() {
    let (_, coord) = coordinator();

    for text in ["A", "B", "C"] {
        // A fresh handle per push stands in for separate producer processes.
        coord.queue().enqueue(&SpeechRequest::new(text)).await.unwrap();
    }
    assert_eq!(coord.queue().len().await.unwrap(), 3);

    let queue = coord.queue();
    let mut seen = Vec::new();
    for _ in 0..3 {
        let item = queue
            .dequeue_blocking(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        seen.push(item.text);
    }
    assert_eq!(seen, ["A", "B", "C"]);
    assert!(queue.dequeue_blocking(Duration::from_millis(50)).await.unwrap().is_none());
}

#[tokio::test]
async fn dequeue_wakes_when_an_item_arrives() {
    let (_, coord) = coordinator();
    let queue = coord.queue();

    let consumer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue_blocking(Duration::from_secs(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    queue.enqueue(&SpeechRequest::new("late")).await.unwrap();

    let item = consumer.await.unwrap().unwrap().unwrap();
    assert_eq!(item.text, "late");
}

#[tokio::test]
async fn malformed_item_is_consumed_and_reported() {
    let (store, coord) = coordinator();
    store.push_back(&coord.keys().queue(), "not json").await.unwrap();

    let err = coord
        .queue()
        .dequeue_blocking(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordError::Payload(_)));
    assert!(coord.queue().is_empty().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn playback_holds_never_overlap() {
    let (_, coord) = coordinator();
    let hold = Duration::from_millis(100);

    let contenders = ["w1", "w2"].map(|holder| {
        let playback = coord.playback();
        tokio::spawn(async move {
            let guard = playback.acquire(holder).await.unwrap();
            let start = Instant::now();
            tokio::time::sleep(hold).await;
            let end = Instant::now();
            assert!(guard.release().await.unwrap());
            (start, end)
        })
    });
    let mut spans: Vec<(Instant, Instant)> = join_all(contenders)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    let (_, first_end) = spans[0];
    let (second_start, _) = spans[1];
    assert!(second_start >= first_end, "playback spans overlapped");
    assert!(coord.playback().holder().await.unwrap().is_none());
}

#[tokio::test]
async fn playback_lock_is_released_when_work_fails() {
    let (_, coord) = coordinator();
    let playback = coord.playback();

    let result: Result<(), &str> = playback
        .run_exclusive("w1", || async { Err("synthesis failed") })
        .await
        .unwrap();
    assert!(result.is_err());
    assert!(playback.holder().await.unwrap().is_none());
}

#[tokio::test]
async fn dropped_guard_releases_in_background() {
    let (_, coord) = coordinator();
    let playback = coord.playback();

    let guard = playback.acquire("w1").await.unwrap();
    drop(guard);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(playback.try_acquire("w2").await.unwrap().is_some());
}

/// Memory store whose first compare-and-delete never finishes.
struct StallingStore {
    inner: MemoryStore,
    stalled: AtomicBool,
}

#[async_trait]
impl KvStore for StallingStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.set_with_expiry(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.inner.delete(keys).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.compare_and_delete(key, expected).await
    }

    async fn compare_and_extend(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inner.compare_and_extend(key, expected, ttl).await
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        self.inner.push_back(key, value).await
    }

    async fn push_back_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.push_back_with_expiry(key, value, ttl).await
    }

    async fn pop_front_blocking(&self, key: &str, timeout: Duration) -> Result<Option<String>, StoreError> {
        self.inner.pop_front_blocking(key, timeout).await
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        self.inner.list_len(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys_with_prefix(prefix).await
    }
}

#[tokio::test]
async fn cancelled_release_falls_back_to_the_deferred_one() {
    let store: Arc<dyn KvStore> = Arc::new(StallingStore {
        inner: MemoryStore::new(),
        stalled: AtomicBool::new(false),
    });
    let playback = PlaybackMutex::new(
        store,
        "test:playback-lock",
        Duration::from_secs(60),
        Duration::from_millis(10),
    );

    let guard = playback.acquire("w1").await.unwrap();
    let release = tokio::time::timeout(Duration::from_millis(20), guard.release()).await;
    assert!(release.is_err(), "first release should stall");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(playback.holder().await.unwrap().is_none());
}

#[tokio::test]
async fn completion_round_trip_and_timeout() {
    let (_, coord) = coordinator();
    let completion = coord.completion();
    let r1 = RequestId::new("r1");

    let waiter = {
        let completion = completion.clone();
        let r1 = r1.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = completion
                .await_completion(&r1, Duration::from_secs(5))
                .await
                .unwrap();
            (outcome, started.elapsed())
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    completion.notify(&r1).await.unwrap();

    let (outcome, elapsed) = waiter.await.unwrap();
    assert_eq!(outcome, CompletionOutcome::Completed);
    assert!(elapsed < Duration::from_secs(5));

    let started = Instant::now();
    let outcome = completion
        .await_completion(&RequestId::new("r2"), Duration::from_secs(1))
        .await
        .unwrap();
    let elapsed = started.elapsed();
    assert_eq!(outcome, CompletionOutcome::TimedOut { processing: false });
    assert!(elapsed >= Duration::from_millis(950));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test]
async fn timeout_reports_in_flight_processing() {
    let (_, coord) = coordinator();
    let completion = coord.completion();
    let id = RequestId::new("slow");

    completion.mark_processing(&id, Duration::from_secs(5)).await.unwrap();
    let outcome = completion
        .await_completion(&id, Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(outcome, CompletionOutcome::TimedOut { processing: true });

    completion.clear_processing(&id).await.unwrap();
    let outcome = completion
        .await_completion(&id, Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(outcome, CompletionOutcome::TimedOut { processing: false });
}

#[tokio::test]
async fn completion_marker_is_consumed_once() {
    let (_, coord) = coordinator();
    let completion = coord.completion();
    let id = RequestId::new("once");

    completion.notify(&id).await.unwrap();
    assert!(
        completion
            .await_completion(&id, Duration::from_millis(50))
            .await
            .unwrap()
            .is_completed()
    );
    assert!(
        !completion
            .await_completion(&id, Duration::from_millis(50))
            .await
            .unwrap()
            .is_completed()
    );
}

#[tokio::test]
async fn reset_clears_queue_and_both_locks() {
    let (store, coord) = coordinator();
    for text in ["one", "two", "three"] {
        coord.queue().enqueue(&SpeechRequest::new(text)).await.unwrap();
    }
    assert!(coord.worker_lease("worker").try_acquire().await.unwrap());
    let guard = coord.playback().acquire("worker").await.unwrap();
    store.set_nx("elsewhere:key", "keep", Duration::from_secs(5)).await.unwrap();

    let status = coord.status().await.unwrap();
    assert!(status.worker_active());
    assert!(status.playing());
    assert_eq!(status.queue_depth, 3);

    assert_eq!(coord.reset().await.unwrap(), 3);

    let status = coord.status().await.unwrap();
    assert_eq!(status.queue_depth, 0);
    assert!(!status.worker_active());
    assert!(!status.playing());
    assert!(
        namespace::list_keys(store.as_ref(), coord.keys())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(store.exists("elsewhere:key").await.unwrap());

    // The stale guard finds nothing to release.
    assert!(!guard.release().await.unwrap());
}
