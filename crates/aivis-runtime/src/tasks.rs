//! Supervised fire-and-forget tasks.
//!
//! A detached task's result never reaches the code that started it. Instead
//! each outcome is sent over a channel to one drain task that logs failures
//! (and panics) with the task's name.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug)]
struct TaskReport {
    name: String,
    outcome: Outcome,
}

#[derive(Debug)]
enum Outcome {
    Ok,
    Failed(String),
    Panicked,
}

/// Counters returned once the drain finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
}

/// Spawns detached tasks and routes their outcomes to the drain.
///
/// Cheap to clone; the drain stops once every clone is dropped and all
/// spawned tasks have reported.
#[derive(Debug, Clone)]
pub struct TaskSupervisor {
    reports: mpsc::UnboundedSender<TaskReport>,
}

/// Handle to the drain task.
#[derive(Debug)]
pub struct TaskDrain {
    handle: JoinHandle<TaskStats>,
}

impl TaskSupervisor {
    /// Create a supervisor and start its drain on the current runtime.
    pub fn start() -> (Self, TaskDrain) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(drain(rx));
        (Self { reports: tx }, TaskDrain { handle })
    }

    /// Run `task` detached. Its error or panic is logged, never propagated.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => Outcome::Ok,
                Ok(Err(e)) => Outcome::Failed(format!("{e:#}")),
                Err(_) => Outcome::Panicked,
            };
            // The drain only goes away at shutdown; nothing left to tell.
            let _ = reports.send(TaskReport { name, outcome });
        })
    }
}

impl TaskDrain {
    /// Wait for every supervisor clone to drop and every report to arrive.
    pub async fn finish(self) -> TaskStats {
        self.handle.await.unwrap_or_default()
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<TaskReport>) -> TaskStats {
    let mut stats = TaskStats::default();
    while let Some(report) = rx.recv().await {
        match report.outcome {
            Outcome::Ok => {
                stats.succeeded += 1;
                debug!(task = %report.name, "Background task finished");
            }
            Outcome::Failed(error) => {
                stats.failed += 1;
                error!(task = %report.name, %error, "Background task failed");
            }
            Outcome::Panicked => {
                stats.panicked += 1;
                error!(task = %report.name, "Background task panicked");
            }
        }
    }
    stats
}
