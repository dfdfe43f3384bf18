//! Store connection with bounded retry and one-shot server auto-start.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use aivis_core::StoreError;
use aivis_core::paths;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::RedisStore;

/// A start lock older than this belongs to an attempt that is long over.
const STALE_LOCK_AGE: Duration = Duration::from_secs(3);

/// Knobs for [`connect_with`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Attempts after the auto-start step.
    pub retries: u32,
    pub retry_interval: Duration,
    /// Whether to launch a local server when the first attempt fails.
    pub autostart: bool,
    pub server_binary: String,
    pub lock_path: PathBuf,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            retries: 10,
            retry_interval: Duration::from_millis(200),
            autostart: true,
            server_binary: "redis-server".to_string(),
            lock_path: paths::store_start_lock_path(),
        }
    }
}

/// Connect to the store at `url` with default options.
pub async fn connect(url: &str) -> Result<RedisStore, StoreError> {
    connect_with(url, &ConnectOptions::default()).await
}

/// Connect to the store at `url`.
///
/// Tries once. If that fails, starts a local server (at most one process
/// wins the start lock), then retries on a fixed interval. Fails with
/// [`StoreError::Unavailable`] once retries are exhausted.
pub async fn connect_with(url: &str, options: &ConnectOptions) -> Result<RedisStore, StoreError> {
    let first_error = match RedisStore::open(url).await {
        Ok(store) => return Ok(store),
        Err(e) => e,
    };
    debug!(url, error = %first_error, "Store not reachable on first attempt");

    if options.autostart {
        start_server_once(options).await;
    }

    let mut last_error = first_error;
    for attempt in 1..=options.retries {
        tokio::time::sleep(options.retry_interval).await;
        match RedisStore::open(url).await {
            Ok(store) => {
                debug!(url, attempt, "Connected after retry");
                return Ok(store);
            }
            Err(e) => last_error = e,
        }
    }

    Err(match last_error {
        e @ StoreError::Unavailable { .. } => e,
        other => StoreError::Unavailable {
            url: url.to_string(),
            reason: other.to_string(),
        },
    })
}

async fn start_server_once(options: &ConnectOptions) {
    if !take_start_lock(&options.lock_path) {
        debug!(lock = %options.lock_path.display(), "Another process is starting the store");
        return;
    }

    match spawn_server(&options.server_binary) {
        Ok(()) => info!(binary = %options.server_binary, "Started local store server"),
        Err(e) => warn!(binary = %options.server_binary, error = %e, "Failed to start store server"),
    }

    // Hold the lock long enough for concurrent callers to see it, then drop
    // it so a later outage can trigger another start.
    let lock_path = options.lock_path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(STALE_LOCK_AGE).await;
        let _ = std::fs::remove_file(&lock_path);
    });
}

/// Exclusively create the lock file. A leftover lock past its age is
/// replaced.
fn take_start_lock(path: &Path) -> bool {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    if create_exclusive(path) {
        return true;
    }

    if lock_is_stale(path) {
        let _ = std::fs::remove_file(path);
        return create_exclusive(path);
    }
    false
}

fn create_exclusive(path: &Path) -> bool {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .is_ok()
}

fn lock_is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= STALE_LOCK_AGE)
}

fn spawn_server(binary: &str) -> std::io::Result<()> {
    let mut cmd = Command::new(binary);
    cmd.args(["--save", "", "--appendonly", "no"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // Own process group so the server outlives a Ctrl+C in our terminal.
    #[cfg(unix)]
    cmd.process_group(0);

    // The child is intentionally not awaited; the server runs on its own.
    let _child = cmd.spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_caller_takes_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("nested").join("start.lock");

        assert!(take_start_lock(&lock));
        assert!(!take_start_lock(&lock));
        assert!(lock.exists());
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("start.lock");
        std::fs::write(&lock, b"").unwrap();
        assert!(!lock_is_stale(&lock));
        assert!(!lock_is_stale(&dir.path().join("missing.lock")));
    }

    #[tokio::test]
    async fn unreachable_store_fails_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConnectOptions {
            retries: 2,
            retry_interval: Duration::from_millis(10),
            autostart: false,
            server_binary: "redis-server".to_string(),
            lock_path: dir.path().join("start.lock"),
        };

        // Port 1 is reserved and never has a Redis server listening.
        let err = connect_with("redis://127.0.0.1:1", &options).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert!(!options.lock_path.exists());
    }

    #[tokio::test]
    async fn missing_server_binary_does_not_abort_retries() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConnectOptions {
            retries: 1,
            retry_interval: Duration::from_millis(10),
            autostart: true,
            server_binary: "aivis-no-such-server-binary".to_string(),
            lock_path: dir.path().join("start.lock"),
        };

        let err = connect_with("redis://127.0.0.1:1", &options).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(options.lock_path.exists());
    }
}
