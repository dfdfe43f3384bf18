//! Resolved process configuration.
//!
//! An [`AppConfig`] is built once at process start from CLI overrides,
//! environment variables, the user settings file and built-in defaults (in
//! that order of precedence) and then passed by reference. Long-lived
//! processes that need to pick up new settings go through [`SharedConfig`],
//! which is the only place a configuration is ever replaced.

use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::domain::{KeySpace, SpeechRequest};
use crate::ports::CoreError;
use crate::settings::UserSettings;

/// Default cloud synthesis endpoint.
pub const DEFAULT_API_URL: &str = "https://api.aivis-project.com/v1";

/// Voice model used when none is configured.
pub const DEFAULT_MODEL_UUID: &str = "a59cb814-0083-4369-8542-f51a29e72af7";

/// Default coordination store.
pub const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379";

/// Protocol timing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinationTimings {
    /// Expiry of the worker lease.
    pub worker_lease_ttl: Duration,
    /// Period of lease renewal. `worker_lease_ttl` must be at least 4x this.
    pub renew_interval: Duration,
    /// Bounded wait of one blocking dequeue; also the shutdown check period.
    pub dequeue_poll: Duration,
    /// Expiry of the playback lock; covers the longest plausible utterance.
    pub playback_lock_ttl: Duration,
    /// Sleep between playback lock attempts.
    pub playback_retry: Duration,
    /// Lifetime of an unconsumed completion marker.
    pub completion_ttl: Duration,
    /// Settle delay after spawning a worker.
    pub spawn_settle: Duration,
    /// Settle delay after terminating processes during reset.
    pub reset_settle: Duration,
}

impl Default for CoordinationTimings {
    fn default() -> Self {
        Self {
            worker_lease_ttl: Duration::from_secs(10),
            renew_interval: Duration::from_secs(2),
            dequeue_poll: Duration::from_secs(1),
            playback_lock_ttl: Duration::from_secs(120),
            playback_retry: Duration::from_millis(100),
            completion_ttl: Duration::from_secs(10),
            spawn_settle: Duration::from_millis(300),
            reset_settle: Duration::from_millis(500),
        }
    }
}

impl CoordinationTimings {
    /// Check the invariants the lease protocol relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.renew_interval.is_zero() || self.dequeue_poll.is_zero() {
            return Err(CoreError::Configuration(
                "renew interval and dequeue poll must be non-zero".to_string(),
            ));
        }
        if self.worker_lease_ttl < self.renew_interval * 4 {
            return Err(CoreError::Configuration(format!(
                "worker lease TTL {:?} must be at least 4x the renew interval {:?}",
                self.worker_lease_ttl, self.renew_interval
            )));
        }
        if self.playback_retry.is_zero() {
            return Err(CoreError::Configuration(
                "playback retry interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Values supplied on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model_uuid: Option<String>,
    pub style_name: Option<String>,
    pub style_id: Option<u32>,
    pub speaking_rate: Option<f64>,
    pub emotional_intensity: Option<f64>,
    pub tempo_dynamics: Option<f64>,
    pub pitch: Option<f64>,
    pub volume: Option<f64>,
    pub leading_silence_seconds: Option<f64>,
    pub trailing_silence_seconds: Option<f64>,
    pub line_break_silence_seconds: Option<f64>,
    pub redis_url: Option<String>,
    pub debug: bool,
}

/// Immutable configuration of one process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_url: String,
    pub model_uuid: String,
    pub style_name: Option<String>,
    pub style_id: Option<u32>,
    pub speaking_rate: Option<f64>,
    pub emotional_intensity: Option<f64>,
    pub tempo_dynamics: Option<f64>,
    pub pitch: Option<f64>,
    pub volume: Option<f64>,
    pub leading_silence_seconds: Option<f64>,
    pub trailing_silence_seconds: Option<f64>,
    pub line_break_silence_seconds: Option<f64>,
    pub redis_url: String,
    pub debug: bool,
    pub keys: KeySpace,
    pub timings: CoordinationTimings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::resolve_with(&ConfigOverrides::default(), &UserSettings::default(), |_| None)
    }
}

impl AppConfig {
    /// Resolve from overrides, the process environment and `settings`.
    pub fn resolve(overrides: &ConfigOverrides, settings: &UserSettings) -> Self {
        Self::resolve_with(overrides, settings, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with<F>(overrides: &ConfigOverrides, settings: &UserSettings, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_str = |key: &str| env(key).filter(|v| !v.is_empty());
        let env_num = |key: &str| env_str(key).and_then(|raw| parse_env::<f64>(key, &raw));

        Self {
            api_key: first_of(&[
                overrides.api_key.clone(),
                env_str("AIVIS_API_KEY"),
                settings.api_key.clone(),
            ])
            .unwrap_or_default(),
            api_url: first_of(&[
                overrides.api_url.clone(),
                env_str("AIVIS_API_URL"),
                settings.api_url.clone(),
            ])
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model_uuid: first_of(&[
                overrides.model_uuid.clone(),
                env_str("AIVIS_MODEL_UUID"),
                settings.model_uuid.clone(),
            ])
            .unwrap_or_else(|| DEFAULT_MODEL_UUID.to_string()),
            style_name: overrides
                .style_name
                .clone()
                .or_else(|| env_str("AIVIS_STYLE_NAME")),
            style_id: overrides.style_id.or_else(|| {
                env_str("AIVIS_STYLE_ID").and_then(|raw| parse_env::<u32>("AIVIS_STYLE_ID", &raw))
            }),
            speaking_rate: overrides
                .speaking_rate
                .or_else(|| env_num("AIVIS_SPEAKING_RATE")),
            emotional_intensity: overrides
                .emotional_intensity
                .or_else(|| env_num("AIVIS_EMOTIONAL_INTENSITY")),
            tempo_dynamics: overrides
                .tempo_dynamics
                .or_else(|| env_num("AIVIS_TEMPO_DYNAMICS")),
            pitch: overrides.pitch.or_else(|| env_num("AIVIS_PITCH")),
            volume: overrides.volume.or_else(|| env_num("AIVIS_VOLUME")),
            leading_silence_seconds: overrides
                .leading_silence_seconds
                .or_else(|| env_num("AIVIS_LEADING_SILENCE_SECONDS")),
            trailing_silence_seconds: overrides
                .trailing_silence_seconds
                .or_else(|| env_num("AIVIS_TRAILING_SILENCE_SECONDS")),
            line_break_silence_seconds: overrides
                .line_break_silence_seconds
                .or_else(|| env_num("AIVIS_LINE_BREAK_SILENCE_SECONDS")),
            redis_url: first_of(&[
                overrides.redis_url.clone(),
                env_str("REDIS_URL"),
                settings.redis_url.clone(),
            ])
            .unwrap_or_else(|| DEFAULT_STORE_URL.to_string()),
            debug: overrides.debug || env_str("AIVIS_DEBUG").as_deref() == Some("1"),
            keys: KeySpace::default(),
            timings: CoordinationTimings::default(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Fill every absent field of `request` from the configured defaults.
    pub fn apply_defaults(&self, mut request: SpeechRequest) -> SpeechRequest {
        if request.model_uuid.is_none() {
            request.model_uuid = Some(self.model_uuid.clone());
        }
        if request.style_name.is_none() {
            request.style_name.clone_from(&self.style_name);
        }
        request.style_id = request.style_id.or(self.style_id);
        request.speaking_rate = request.speaking_rate.or(self.speaking_rate);
        request.emotional_intensity = request.emotional_intensity.or(self.emotional_intensity);
        request.tempo_dynamics = request.tempo_dynamics.or(self.tempo_dynamics);
        request.pitch = request.pitch.or(self.pitch);
        request.volume = request.volume.or(self.volume);
        request.leading_silence_seconds = request
            .leading_silence_seconds
            .or(self.leading_silence_seconds);
        request.trailing_silence_seconds = request
            .trailing_silence_seconds
            .or(self.trailing_silence_seconds);
        request.line_break_silence_seconds = request
            .line_break_silence_seconds
            .or(self.line_break_silence_seconds);
        request
    }

    /// Build a queue payload for `text` with the configured defaults.
    pub fn build_request(&self, text: impl Into<String>, wait_ms: Option<u64>) -> SpeechRequest {
        let request = self.apply_defaults(SpeechRequest::new(text));
        match wait_ms {
            Some(ms) => request.with_wait_ms(ms),
            None => request,
        }
    }
}

fn first_of(candidates: &[Option<String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|v| !v.is_empty())
        .cloned()
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    if let Ok(value) = raw.trim().parse() {
        Some(value)
    } else {
        tracing::warn!(key, value = raw, "Ignoring unparseable environment value");
        None
    }
}

/// Process-wide configuration handle with a single swap point.
///
/// Readers take an `Arc` snapshot per unit of work; `replace` publishes a
/// new snapshot without disturbing readers that hold the old one.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<AppConfig>>>,
}

impl SharedConfig {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> Arc<AppConfig> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publish a new configuration.
    pub fn replace(&self, config: AppConfig) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model_uuid, DEFAULT_MODEL_UUID);
        assert_eq!(config.redis_url, DEFAULT_STORE_URL);
        assert!(!config.has_api_key());
        assert!(!config.debug);
    }

    #[test]
    fn precedence_is_flag_env_settings_default() {
        let settings = UserSettings {
            api_key: Some("from-settings".to_string()),
            model_uuid: Some("model-settings".to_string()),
            redis_url: Some("redis://settings".to_string()),
            ..UserSettings::default()
        };
        let env = env_of(&[
            ("AIVIS_API_KEY", "from-env"),
            ("AIVIS_MODEL_UUID", "model-env"),
        ]);
        let overrides = ConfigOverrides {
            api_key: Some("from-flag".to_string()),
            ..ConfigOverrides::default()
        };

        let config = AppConfig::resolve_with(&overrides, &settings, env);
        assert_eq!(config.api_key, "from-flag");
        assert_eq!(config.model_uuid, "model-env");
        assert_eq!(config.redis_url, "redis://settings");
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let env = env_of(&[("AIVIS_API_URL", ""), ("AIVIS_PITCH", "")]);
        let config = AppConfig::resolve_with(&ConfigOverrides::default(), &UserSettings::default(), env);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.pitch, None);
    }

    #[test]
    fn numeric_env_values_are_parsed() {
        let env = env_of(&[
            ("AIVIS_SPEAKING_RATE", "1.25"),
            ("AIVIS_STYLE_ID", "4"),
            ("AIVIS_VOLUME", "loud"),
            ("AIVIS_DEBUG", "1"),
        ]);
        let config = AppConfig::resolve_with(&ConfigOverrides::default(), &UserSettings::default(), env);
        assert_eq!(config.speaking_rate, Some(1.25));
        assert_eq!(config.style_id, Some(4));
        assert_eq!(config.volume, None);
        assert!(config.debug);
    }

    #[test]
    fn build_request_fills_defaults_and_keeps_caller_values() {
        let env = env_of(&[("AIVIS_PITCH", "0.2"), ("AIVIS_SPEAKING_RATE", "1.1")]);
        let config = AppConfig::resolve_with(&ConfigOverrides::default(), &UserSettings::default(), env);

        let request = config.build_request("hello", Some(250));
        assert_eq!(request.model_uuid.as_deref(), Some(DEFAULT_MODEL_UUID));
        assert_eq!(request.pitch, Some(0.2));
        assert_eq!(request.wait_ms, Some(250));
        assert_eq!(request.volume, None);

        let mut explicit = SpeechRequest::new("x");
        explicit.pitch = Some(-0.5);
        let merged = config.apply_defaults(explicit);
        assert_eq!(merged.pitch, Some(-0.5));
        assert_eq!(merged.speaking_rate, Some(1.1));
    }

    #[test]
    fn default_timings_are_valid() {
        let timings = CoordinationTimings::default();
        timings.validate().unwrap();
        assert!(timings.worker_lease_ttl >= timings.renew_interval * 4);
    }

    #[test]
    fn short_lease_ttl_is_rejected() {
        let timings = CoordinationTimings {
            worker_lease_ttl: Duration::from_secs(3),
            renew_interval: Duration::from_secs(1),
            ..CoordinationTimings::default()
        };
        assert!(timings.validate().is_err());
    }

    #[test]
    fn shared_config_swaps_snapshot() {
        let shared = SharedConfig::new(AppConfig::default());
        let before = shared.current();

        let mut next = AppConfig::default();
        next.api_key = "new-key".to_string();
        shared.replace(next);

        assert!(!before.has_api_key());
        assert_eq!(shared.current().api_key, "new-key");
    }
}
