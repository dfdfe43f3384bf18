//! Tracing setup per process role.
//!
//! `RUST_LOG` wins when set. Otherwise `--debug` means `debug`, and the
//! default is `info` for the worker and `warn` for everything else.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Where a role's logs go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRole {
    /// Interactive commands and the MCP server: stderr. Stdout is reserved
    /// for command output or the protocol.
    Console,
    /// Detached worker: `worker.log` in the log directory.
    Worker,
}

fn default_level(role: LogRole, debug: bool) -> &'static str {
    match (debug, role) {
        (true, _) => "debug",
        (false, LogRole::Worker) => "info",
        (false, LogRole::Console) => "warn",
    }
}

fn env_filter(role: LogRole, debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(role, debug)))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(role: LogRole, debug: bool) {
    let filter = env_filter(role, debug);
    match role {
        LogRole::Console => console(filter),
        LogRole::Worker => match aivis_core::paths::worker_log_path() {
            Ok(path) => {
                if let Err(e) = to_file(filter, &path) {
                    // Nobody reads the worker's stderr, but it is all we have.
                    eprintln!("Failed to open worker log {}: {e}", path.display());
                    console(env_filter(role, debug));
                }
            }
            Err(e) => {
                eprintln!("No log directory: {e}");
                console(filter);
            }
        },
    }
}

fn console(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .ok();
}

fn to_file(filter: EnvFilter, path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .compact(),
        )
        .try_init()
        .ok();
    Ok(())
}
