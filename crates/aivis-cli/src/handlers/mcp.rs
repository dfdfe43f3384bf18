//! `mcp` (the default): serve the speech tool over stdio.

use std::sync::Arc;

use aivis_core::{ConfigOverrides, SharedConfig};
use aivis_mcp::{McpServer, SpeechBackend};
use aivis_runtime::{TaskSupervisor, signals};
use tracing::{info, warn};

use crate::bootstrap;
use crate::error::CliError;

pub async fn execute(overrides: &ConfigOverrides) -> Result<(), CliError> {
    let config = bootstrap::resolve_config(overrides);
    config.timings.validate()?;
    aivis_mcp::warn_missing_dependencies();
    if !config.has_api_key() {
        warn!("No API key configured; speech requests will fail until one is set");
    }

    let launcher = bootstrap::worker_launcher(overrides)?;
    let backend = SpeechBackend::new(SharedConfig::new(config), Arc::new(launcher));
    let (tasks, drain) = TaskSupervisor::start();
    let server = McpServer::new(backend, tasks);
    info!("MCP server listening on stdio");

    let result = tokio::select! {
        result = server.serve_stdio() => result.map_err(CliError::from),
        () = signals::termination() => {
            // In-flight calls may be waiting on playback; do not drain them.
            info!("MCP server stopped by signal");
            return Ok(());
        }
    };

    drop(server);
    let stats = drain.finish().await;
    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        panicked = stats.panicked,
        "MCP server stopped"
    );
    result
}
