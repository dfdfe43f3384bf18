//! Speech rendering port: synthesis followed by playback.
//!
//! The worker only needs "render this request to the speakers and tell me
//! how it went". HTTP and player details stay in the runtime adapter.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AppConfig;
use crate::domain::SpeechRequest;

/// Errors from the synthesis pipeline.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// No API key configured; nothing was sent.
    #[error("API key is not configured")]
    MissingApiKey,

    /// The synthesis endpoint answered with a non-success status.
    #[error("Synthesis request failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network failure while calling the endpoint or reading the stream.
    #[error("Synthesis transport error: {0}")]
    Transport(String),

    /// No supported audio player on PATH.
    #[error("No audio player found (tried: {tried})")]
    PlayerNotFound { tried: String },

    /// The player exited abnormally or could not be fed.
    #[error("Audio player error: {0}")]
    Player(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Player binary that rendered the audio.
    pub player: String,
    /// Audio bytes streamed into the player.
    pub bytes: u64,
    /// Wall time from request start to player exit.
    pub elapsed: Duration,
}

/// Synthesizes a request and plays it to completion.
///
/// `config` is the snapshot current when the item was dequeued, so a
/// reloaded configuration applies from the next item on.
#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    async fn render(
        &self,
        request: &SpeechRequest,
        config: &AppConfig,
    ) -> Result<PlaybackReport, SpeechError>;
}
