//! `health`: one-screen status of everything a spoken request depends on.

use std::fmt;
use std::sync::Arc;

use aivis_coord::{Coordinator, NamespaceStatus};
use aivis_core::{AppConfig, ConfigOverrides, KvStore};
use aivis_runtime::process::{OwnProcess, ProcessRole, list_own_processes};
use aivis_runtime::speech::available_players;
use aivis_store::RedisStore;

use crate::bootstrap;
use crate::error::CliError;

#[derive(Debug)]
pub struct HealthReport {
    pub api_key_set: bool,
    pub store_url: String,
    /// `Err` carries the reason the store could not be queried.
    pub store: Result<NamespaceStatus, String>,
    pub processes: Vec<OwnProcess>,
    pub players: Vec<String>,
    pub model_uuid: String,
}

impl HealthReport {
    fn workers(&self) -> usize {
        self.processes
            .iter()
            .filter(|p| p.role == ProcessRole::Worker)
            .count()
    }
}

fn ok_ng(ok: bool, detail: &str) -> String {
    match (ok, detail.is_empty()) {
        (true, true) => "OK".to_string(),
        (true, false) => format!("OK ({detail})"),
        (false, true) => "NG".to_string(),
        (false, false) => format!("NG ({detail})"),
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== aivis-mcp health check ===")?;
        writeln!(f)?;
        let key_detail = if self.api_key_set { "" } else { "not set" };
        writeln!(f, "API Key:       {}", ok_ng(self.api_key_set, key_detail))?;

        match &self.store {
            Ok(status) => {
                writeln!(f, "Redis:         {}", ok_ng(true, &self.store_url))?;
                let active = status.worker_active();
                let worker_detail = if active { "" } else { "stopped" };
                writeln!(f, "Worker:        {}", ok_ng(active, worker_detail))?;
                writeln!(f, "Queue:         {} item(s)", status.queue_depth)?;
                let lock = if status.playing() { "in use" } else { "free" };
                writeln!(f, "Play Lock:     {lock}")?;
            }
            Err(reason) => {
                writeln!(
                    f,
                    "Redis:         NG (cannot connect to {}: {reason})",
                    self.store_url
                )?;
            }
        }

        let workers = self.workers();
        writeln!(f, "Processes:     {}", self.processes.len())?;
        if workers > 1 {
            writeln!(f, "  Workers:     {workers} (more than one running)")?;
        } else {
            writeln!(f, "  Workers:     {workers}")?;
        }
        writeln!(f, "  MCP Servers: {}", self.processes.len() - workers)?;
        for p in &self.processes {
            let tag = match p.role {
                ProcessRole::Worker => "[worker]",
                ProcessRole::Server => "[mcp]",
            };
            writeln!(f, "  PID {}: {tag} {}", p.pid, p.command)?;
        }

        let players = if self.players.is_empty() {
            "none found".to_string()
        } else {
            self.players.join(", ")
        };
        writeln!(f, "Audio Player:  {}", ok_ng(!self.players.is_empty(), &players))?;
        write!(f, "Model UUID:    {}", self.model_uuid)
    }
}

/// Query the store without auto-starting it; health reports, it does not fix.
async fn store_status(config: &AppConfig) -> Result<NamespaceStatus, String> {
    let store = RedisStore::open(&config.redis_url)
        .await
        .map_err(|e| e.to_string())?;
    let store: Arc<dyn KvStore> = Arc::new(store);
    Coordinator::from_config(store, config)
        .status()
        .await
        .map_err(|e| e.to_string())
}

pub async fn gather(config: &AppConfig) -> HealthReport {
    HealthReport {
        api_key_set: config.has_api_key(),
        store_url: config.redis_url.clone(),
        store: store_status(config).await,
        processes: list_own_processes(),
        players: available_players(),
        model_uuid: config.model_uuid.clone(),
    }
}

/// Print the report. Fails with "unavailable" when the store is down.
pub async fn execute(overrides: &ConfigOverrides) -> Result<(), CliError> {
    let config = bootstrap::resolve_config(overrides);
    let report = gather(&config).await;
    println!("{report}");
    match report.store {
        Ok(_) => Ok(()),
        Err(reason) => Err(CliError::Unavailable(format!(
            "coordination store at {} is unreachable: {reason}",
            config.redis_url
        ))),
    }
}
