//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the coordination core and the worker
//! expect from infrastructure. They contain no implementation details.
//!
//! # Design Rules
//!
//! - No `redis` types in any signature
//! - No process or HTTP details; the speech port is intent-based

pub mod speech;
pub mod store;

use thiserror::Error;

pub use speech::{PlaybackReport, SpeechError, SpeechRenderer};
pub use store::{KvStore, StoreError};

use crate::paths::PathError;
use crate::settings::SettingsError;

/// Umbrella error for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Coordination store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Synthesis or playback failure.
    #[error(transparent)]
    Speech(#[from] SpeechError),

    /// Persisted settings could not be read or written.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Platform path resolution failed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Input rejected before reaching the queue.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Inconsistent configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}
