//! Platform paths used by aivis-mcp.

use std::path::PathBuf;

use thiserror::Error;

const APP_DIR: &str = "aivis-mcp";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the user's home directory.
    #[error("Cannot determine home directory")]
    NoHomeDir,

    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,
}

/// `~/.config/aivis-mcp` on every platform.
pub fn config_dir() -> Result<PathBuf, PathError> {
    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    Ok(home.join(".config").join(APP_DIR))
}

/// Location of the persisted user settings.
pub fn settings_path() -> Result<PathBuf, PathError> {
    Ok(config_dir()?.join("config.json"))
}

/// Directory for worker logs.
pub fn log_dir() -> Result<PathBuf, PathError> {
    let data = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    Ok(data.join(APP_DIR).join("logs"))
}

/// Log file of the detached worker process.
pub fn worker_log_path() -> Result<PathBuf, PathError> {
    Ok(log_dir()?.join("worker.log"))
}

/// Scratch directory for lock files.
pub fn runtime_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DIR)
}

/// Exclusive lock taken while auto-starting the store server.
pub fn store_start_lock_path() -> PathBuf {
    runtime_dir().join("redis-start.lock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_lives_in_config_dir() {
        if let (Ok(dir), Ok(file)) = (config_dir(), settings_path()) {
            assert_eq!(file.parent(), Some(dir.as_path()));
            assert!(dir.ends_with(".config/aivis-mcp"));
        }
    }

    #[test]
    fn lock_is_under_runtime_dir() {
        assert!(store_start_lock_path().starts_with(runtime_dir()));
    }
}
