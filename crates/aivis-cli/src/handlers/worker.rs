//! `worker`: the background process that plays queued requests.
//!
//! Started by servers and `speak`; never meant to be run by hand.

use std::sync::Arc;

use aivis_core::{ConfigOverrides, SharedConfig};
use aivis_runtime::{CloudSpeechPipeline, TaskSupervisor, Worker, WorkerExit, signals};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bootstrap;
use crate::error::CliError;

pub async fn execute(overrides: &ConfigOverrides) -> Result<(), CliError> {
    let config = bootstrap::resolve_config(overrides);
    let coord = bootstrap::connect(&config).await?;
    let renderer = Arc::new(CloudSpeechPipeline::new()?);
    let shared = SharedConfig::new(config);
    let (tasks, drain) = TaskSupervisor::start();

    let shutdown = CancellationToken::new();
    let on_term = signals::cancel_on_termination(shutdown.clone());
    let reload_overrides = overrides.clone();
    let on_hup = signals::reload_on_hangup(
        shared.clone(),
        move || Some(bootstrap::resolve_config(&reload_overrides)),
        shutdown.clone(),
    );

    let mut worker = Worker::new(coord, shared, renderer, tasks)?;
    info!(holder = worker.holder_id(), pid = std::process::id(), "Worker starting");
    let exit = worker.run(shutdown.clone()).await;

    shutdown.cancel();
    let _ = on_term.await;
    let _ = on_hup.await;
    let processed = worker.processed();
    drop(worker);
    let stats = drain.finish().await;

    let exit = exit?;
    match exit {
        WorkerExit::LostElection => info!("Another worker is active; exiting"),
        WorkerExit::LeaseLost => info!(processed, "Lease lost; exiting"),
        WorkerExit::Shutdown => info!(processed, "Worker stopped"),
    }
    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        panicked = stats.panicked,
        "Background tasks finished"
    );
    Ok(())
}
