//! CLI bootstrap, the composition root.
//!
//! Configuration is resolved here, and the store connection and worker
//! launcher are built here. Handlers receive ready-made pieces.

use std::sync::Arc;

use aivis_coord::Coordinator;
use aivis_core::{AppConfig, ConfigOverrides, KvStore, UserSettings};
use aivis_runtime::{ProcessLauncher, WorkerSupervisor};

use crate::error::CliError;

/// Resolve flags, environment and the settings file into one config.
pub fn resolve_config(overrides: &ConfigOverrides) -> AppConfig {
    AppConfig::resolve(overrides, &UserSettings::load())
}

/// Connect to the store, starting it once if needed.
pub async fn connect(config: &AppConfig) -> Result<Coordinator, CliError> {
    config.timings.validate()?;
    let store = aivis_store::connect(&config.redis_url).await?;
    let store: Arc<dyn KvStore> = Arc::new(store);
    Ok(Coordinator::from_config(store, config))
}

/// Launcher that re-runs this executable as a worker.
///
/// Flags do not reach the child's argv, so the ones the worker resolves
/// for itself are handed over as environment variables.
pub fn worker_launcher(overrides: &ConfigOverrides) -> Result<ProcessLauncher, CliError> {
    let mut launcher = ProcessLauncher::current_exe()?;
    for (key, value) in worker_env(overrides) {
        launcher = launcher.env(key, value);
    }
    Ok(launcher)
}

fn worker_env(overrides: &ConfigOverrides) -> Vec<(&'static str, String)> {
    let mut env = Vec::new();
    if let Some(key) = &overrides.api_key {
        env.push(("AIVIS_API_KEY", key.clone()));
    }
    if let Some(url) = &overrides.api_url {
        env.push(("AIVIS_API_URL", url.clone()));
    }
    if let Some(url) = &overrides.redis_url {
        env.push(("REDIS_URL", url.clone()));
    }
    if overrides.debug {
        env.push(("AIVIS_DEBUG", "1".to_string()));
    }
    env
}

/// Supervisor for the connected namespace.
pub fn worker_supervisor(
    coord: &Coordinator,
    overrides: &ConfigOverrides,
) -> Result<WorkerSupervisor, CliError> {
    let launcher = worker_launcher(overrides)?;
    Ok(WorkerSupervisor::new(coord.clone(), Arc::new(launcher)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_given_flags_are_forwarded() {
        assert!(worker_env(&ConfigOverrides::default()).is_empty());

        let overrides = ConfigOverrides {
            redis_url: Some("redis://h:1".to_string()),
            debug: true,
            pitch: Some(0.5),
            ..ConfigOverrides::default()
        };
        let env = worker_env(&overrides);
        assert_eq!(
            env,
            vec![
                ("REDIS_URL", "redis://h:1".to_string()),
                ("AIVIS_DEBUG", "1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn invalid_timings_fail_before_connecting() {
        let mut config = AppConfig::default();
        config.timings.renew_interval = std::time::Duration::ZERO;
        config.redis_url = "redis://127.0.0.1:1".to_string();

        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, CliError::Config(_)), "{err:?}");
    }
}
