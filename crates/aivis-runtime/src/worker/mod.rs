//! The elected worker.
//!
//! ```text
//! Starting ──try_acquire──▶ Lost ──▶ Terminated
//!     │
//!     ▼
//!  Active ◀─renew─┐
//!     │    └──────┘
//!     ├──renewal fails──▶ LeaseLost ──┐
//!     └──signal─────────▶ ShuttingDown┴──▶ Terminated
//! ```
//!
//! Losing the election is not an error: the process exits at once instead
//! of idling. Once active, the worker pops one request at a time, renders it
//! under the playback mutex and signals completion. Lease loss is
//! authoritative: the in-flight render is aborted (which kills the player)
//! and nothing further is dequeued.

mod renewal;

use std::sync::Arc;

use aivis_coord::{CoordError, Coordinator, Lease};
use aivis_core::{AppConfig, CoreError, SharedConfig, SpeechRenderer, SpeechRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::tasks::TaskSupervisor;

/// Lifecycle of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    /// Another worker holds the lease.
    Lost,
    Active,
    LeaseLost,
    ShuttingDown,
    Terminated,
}

/// Why [`Worker::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Another worker won the election.
    LostElection,
    /// The lease was taken over or could not be renewed.
    LeaseLost,
    /// Shutdown was requested; the lease has been released.
    Shutdown,
}

/// Holder id unique to this process.
pub fn generate_holder_id() -> String {
    format!("{}-{}", std::process::id(), Uuid::new_v4())
}

pub struct Worker {
    coord: Coordinator,
    config: SharedConfig,
    renderer: Arc<dyn SpeechRenderer>,
    tasks: TaskSupervisor,
    holder_id: String,
    state: WorkerState,
    processed: u64,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("holder_id", &self.holder_id)
            .field("state", &self.state)
            .field("processed", &self.processed)
            .finish_non_exhaustive()
    }
}

enum Rendered {
    Done,
    Failed,
    Aborted,
}

impl Worker {
    /// Fails when the coordinator's timings cannot keep a lease alive.
    pub fn new(
        coord: Coordinator,
        config: SharedConfig,
        renderer: Arc<dyn SpeechRenderer>,
        tasks: TaskSupervisor,
    ) -> Result<Self, CoreError> {
        coord.timings().validate()?;
        Ok(Self {
            coord,
            config,
            renderer,
            tasks,
            holder_id: generate_holder_id(),
            state: WorkerState::Starting,
            processed: 0,
        })
    }

    #[must_use]
    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub const fn state(&self) -> WorkerState {
        self.state
    }

    /// Requests taken off the queue so far.
    pub const fn processed(&self) -> u64 {
        self.processed
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(holder_id = %self.holder_id, from = ?self.state, to = ?next, "Worker state change");
        self.state = next;
    }

    /// Contend for the lease and, if won, process the queue until `shutdown`
    /// fires or the lease is lost.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<WorkerExit, CoordError> {
        let lease = self.coord.worker_lease(self.holder_id.clone());
        if !lease.try_acquire().await? {
            info!(holder_id = %self.holder_id, "Another worker is active; exiting");
            self.transition(WorkerState::Lost);
            self.transition(WorkerState::Terminated);
            return Ok(WorkerExit::LostElection);
        }

        self.transition(WorkerState::Active);
        info!(holder_id = %self.holder_id, "Worker elected");

        let stop_renewal = CancellationToken::new();
        let lease_lost = CancellationToken::new();
        let renewal = {
            let lease = lease.clone();
            let interval = self.coord.timings().renew_interval;
            let stop = stop_renewal.clone();
            let lost = lease_lost.clone();
            self.tasks.spawn("lease-renewal", async move {
                renewal::renew_until_lost(lease, interval, stop, lost).await;
                anyhow::Ok(())
            })
        };

        let exit = self.process_queue(&shutdown, &lease_lost).await;

        stop_renewal.cancel();
        let _ = renewal.await;
        self.finish(exit, &lease).await;
        Ok(exit)
    }

    async fn process_queue(
        &mut self,
        shutdown: &CancellationToken,
        lease_lost: &CancellationToken,
    ) -> WorkerExit {
        let queue = self.coord.queue();
        let poll = self.coord.timings().dequeue_poll;

        loop {
            if lease_lost.is_cancelled() {
                return WorkerExit::LeaseLost;
            }
            if shutdown.is_cancelled() {
                return WorkerExit::Shutdown;
            }

            // Never cancelled mid-call: a dropped pop could lose an item
            // the store already handed over. The bounded wait is the
            // cancellation point.
            match queue.dequeue_blocking(poll).await {
                Ok(Some(request)) => {
                    self.processed += 1;
                    self.handle(request, lease_lost).await;
                }
                Ok(None) => {}
                Err(CoordError::Payload(reason)) => {
                    warn!(%reason, "Dropping malformed queue item");
                }
                Err(e) => {
                    warn!(error = %e, "Dequeue failed; backing off");
                    tokio::select! {
                        () = tokio::time::sleep(poll) => {}
                        () = shutdown.cancelled() => {}
                        () = lease_lost.cancelled() => {}
                    }
                }
            }
        }
    }

    async fn handle(&self, request: SpeechRequest, lease_lost: &CancellationToken) {
        let config = self.config.current();
        let completion = self.coord.completion();
        let request_id = request.request_id.clone();

        if let Some(id) = &request_id {
            let ttl = self.coord.timings().playback_lock_ttl;
            if let Err(e) = completion.mark_processing(id, ttl).await {
                warn!(request_id = %id, error = %e, "Failed to set processing marker");
            }
        }

        let rendered = self.render(&request, &config, lease_lost).await;

        if let Some(id) = &request_id {
            if let Err(e) = completion.clear_processing(id).await {
                warn!(request_id = %id, error = %e, "Failed to clear processing marker");
            }
            if matches!(rendered, Rendered::Done) {
                if let Err(e) = completion.notify(id).await {
                    warn!(request_id = %id, error = %e, "Failed to signal completion");
                }
            }
        }
    }

    async fn render(
        &self,
        request: &SpeechRequest,
        config: &AppConfig,
        lease_lost: &CancellationToken,
    ) -> Rendered {
        if let Err(e) = request.validate() {
            warn!(error = %e, "Skipping invalid request");
            return Rendered::Failed;
        }

        // Cooperative stagger; only checked once it has elapsed.
        if let Some(delay) = request.pre_delay() {
            debug!(?delay, "Delaying synthesis");
            tokio::time::sleep(delay).await;
        }
        if lease_lost.is_cancelled() {
            return Rendered::Aborted;
        }

        let playback = self.coord.playback();
        let work = || self.renderer.render(request, config);
        let outcome = tokio::select! {
            result = playback.run_exclusive(&self.holder_id, work) => result,
            () = lease_lost.cancelled() => {
                warn!("Lease lost during playback; aborting render");
                return Rendered::Aborted;
            }
        };

        match outcome {
            Ok(Ok(report)) => {
                info!(
                    player = %report.player,
                    bytes = report.bytes,
                    elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                    "Playback finished"
                );
                Rendered::Done
            }
            Ok(Err(e)) => {
                error!(error = %e, "Speech rendering failed");
                Rendered::Failed
            }
            Err(e) => {
                warn!(error = %e, "Could not take the playback lock");
                Rendered::Failed
            }
        }
    }

    async fn finish(&mut self, exit: WorkerExit, lease: &Lease) {
        match exit {
            WorkerExit::Shutdown => {
                self.transition(WorkerState::ShuttingDown);
                match lease.release().await {
                    Ok(released) => info!(released, "Worker lease released"),
                    Err(e) => warn!(error = %e, "Failed to release worker lease; it will expire"),
                }
            }
            WorkerExit::LeaseLost => self.transition(WorkerState::LeaseLost),
            WorkerExit::LostElection => {}
        }
        info!(holder_id = %self.holder_id, processed = self.processed, ?exit, "Worker stopped");
        self.transition(WorkerState::Terminated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_ids_are_unique_and_tagged_with_pid() {
        let a = generate_holder_id();
        let b = generate_holder_id();
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("{}-", std::process::id())));
    }
}
