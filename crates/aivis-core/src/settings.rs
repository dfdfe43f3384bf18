//! Persisted user settings.
//!
//! A small JSON file written by `aivis-mcp init`. Reading is lenient: a
//! missing or malformed file yields empty settings so a broken file never
//! blocks speech.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::paths::{self, PathError};

/// Values the user saved with `init`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

/// Settings persistence error.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Failed to write settings file {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Failed to serialize settings: {0}")]
    Serialize(String),
}

impl UserSettings {
    /// Load from the default location.
    pub fn load() -> Self {
        match paths::settings_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                tracing::debug!(error = %e, "No settings path; using empty settings");
                Self::default()
            }
        }
    }

    /// Load from `path`, falling back to empty settings.
    pub fn load_from(path: &Path) -> Self {
        let Ok(raw) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed settings file");
            Self::default()
        })
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = paths::settings_path()?;
        self.save_to(&path)
    }

    /// Write pretty JSON with a trailing newline, creating parent dirs.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |e: std::io::Error| SettingsError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut body = serde_json::to_string_pretty(self)
            .map_err(|e| SettingsError::Serialize(e.to_string()))?;
        body.push('\n');
        fs::write(path, body).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let settings = UserSettings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings, UserSettings::default());
    }

    #[test]
    fn malformed_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(UserSettings::load_from(&path), UserSettings::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let settings = UserSettings {
            api_key: Some("key".to_string()),
            model_uuid: Some("model".to_string()),
            ..UserSettings::default()
        };

        settings.save_to(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        assert!(raw.contains("\"apiKey\""));
        assert!(!raw.contains("redisUrl"));

        assert_eq!(UserSettings::load_from(&path), settings);
    }
}
