//! Queue submission for tool calls.
//!
//! The store connection is made on first use so a server started before
//! the store still answers `initialize` and `tools/list`; a store that
//! stays unreachable fails the tool call, not the session. When a call
//! finds the store gone, the connection is dropped and the next call
//! connects again (auto-starting the store if needed).

use std::sync::Arc;
use std::time::Duration;

use aivis_coord::{CompletionOutcome, Coordinator};
use aivis_core::{AppConfig, KvStore, SharedConfig, SpeechRequest, StoreError};
use aivis_runtime::{EnsureOutcome, WorkerLauncher, WorkerSupervisor};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::McpServerError;

/// How long a waiting call waits for playback, on top of its pre-delay.
pub const PLAYBACK_WAIT: Duration = Duration::from_secs(60);

/// Opens the coordination namespace for `config`.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &AppConfig) -> Result<Coordinator, StoreError>;
}

/// Connects to the configured Redis URL with auto-start and retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, config: &AppConfig) -> Result<Coordinator, StoreError> {
        let store = aivis_store::connect(&config.redis_url).await?;
        let store: Arc<dyn KvStore> = Arc::new(store);
        Ok(Coordinator::from_config(store, config))
    }
}

/// Hands out the same coordinator every time.
struct FixedConnector(Coordinator);

#[async_trait]
impl StoreConnector for FixedConnector {
    async fn connect(&self, _config: &AppConfig) -> Result<Coordinator, StoreError> {
        Ok(self.0.clone())
    }
}

struct Connected {
    coord: Coordinator,
    supervisor: WorkerSupervisor,
}

pub struct SpeechBackend {
    config: SharedConfig,
    launcher: Arc<dyn WorkerLauncher>,
    connector: Arc<dyn StoreConnector>,
    connected: Mutex<Option<Arc<Connected>>>,
}

impl std::fmt::Debug for SpeechBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpeechBackend {
    /// Backend that connects to the configured store on first use.
    pub fn new(config: SharedConfig, launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self::with_connector(config, Arc::new(RedisConnector), launcher)
    }

    pub fn with_connector(
        config: SharedConfig,
        connector: Arc<dyn StoreConnector>,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Self {
        Self {
            config,
            launcher,
            connector,
            connected: Mutex::new(None),
        }
    }

    /// Backend over an existing coordinator.
    pub fn with_coordinator(
        config: SharedConfig,
        coord: Coordinator,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Self {
        Self::with_connector(config, Arc::new(FixedConnector(coord)), launcher)
    }

    pub const fn config(&self) -> &SharedConfig {
        &self.config
    }

    async fn connected(&self) -> Result<Arc<Connected>, McpServerError> {
        let mut slot = self.connected.lock().await;
        if let Some(connected) = slot.as_ref() {
            return Ok(Arc::clone(connected));
        }
        let config = self.config.current();
        let coord = self.connector.connect(&config).await?;
        let supervisor = WorkerSupervisor::new(coord.clone(), Arc::clone(&self.launcher));
        let connected = Arc::new(Connected { coord, supervisor });
        *slot = Some(Arc::clone(&connected));
        Ok(connected)
    }

    /// Forget `stale` so the next call connects again. A connection made
    /// by a concurrent call in the meantime is kept.
    async fn disconnect(&self, stale: &Arc<Connected>) {
        let mut slot = self.connected.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, stale)) {
            *slot = None;
        }
    }

    /// Enqueue `request` and make sure a worker will pick it up.
    ///
    /// With a request id, waits for playback and returns the outcome.
    pub async fn submit(
        &self,
        request: SpeechRequest,
    ) -> Result<Option<CompletionOutcome>, McpServerError> {
        let connected = self.connected().await?;
        let result = Self::submit_on(&connected, &request).await;
        if let Err(e) = &result {
            if e.is_unavailable() {
                warn!(error = %e, "Lost the coordination store; reconnecting on the next call");
                self.disconnect(&connected).await;
            }
        }
        result
    }

    async fn submit_on(
        connected: &Connected,
        request: &SpeechRequest,
    ) -> Result<Option<CompletionOutcome>, McpServerError> {
        let depth = connected.coord.queue().enqueue(request).await?;
        debug!(queue_len = depth, "Speech request queued");

        if connected.supervisor.ensure_worker().await? == EnsureOutcome::Spawned {
            info!(queue_len = depth, "No worker was running; started one");
        }

        let Some(id) = &request.request_id else {
            return Ok(None);
        };
        let timeout = PLAYBACK_WAIT + request.pre_delay().unwrap_or_default();
        let outcome = connected
            .coord
            .completion()
            .await_completion(id, timeout)
            .await?;
        Ok(Some(outcome))
    }
}
