//! Core domain types and port definitions for aivis-mcp.
//!
//! This crate has no I/O adapters. It defines:
//!
//! - the queue payload ([`SpeechRequest`]) and the shared-store key layout
//!   ([`KeySpace`]),
//! - the resolved, immutable process configuration ([`AppConfig`]) and its
//!   single reload point ([`SharedConfig`]),
//! - persisted user settings ([`UserSettings`]),
//! - the ports the rest of the workspace plugs into: [`KvStore`] for the
//!   coordination store and [`SpeechRenderer`] for synthesis + playback.
#![deny(unsafe_code)]

pub mod config;
pub mod domain;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use config::{
    AppConfig, ConfigOverrides, CoordinationTimings, DEFAULT_API_URL, DEFAULT_MODEL_UUID,
    DEFAULT_STORE_URL, SharedConfig,
};
pub use domain::{
    DEFAULT_KEY_PREFIX, KeySpace, MAX_STYLE_ID, MAX_WAIT_MS, RequestId, SpeechRequest,
};
pub use paths::PathError;
pub use ports::{CoreError, KvStore, PlaybackReport, SpeechError, SpeechRenderer, StoreError};
pub use settings::{SettingsError, UserSettings};
