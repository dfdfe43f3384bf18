//! Queue payload for a single speech request.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ports::CoreError;

/// Upper bound for the per-request pre-synthesis delay.
pub const MAX_WAIT_MS: u64 = 60_000;

/// Highest style id a voice model can have.
pub const MAX_STYLE_ID: u32 = 31;

/// NaN fails too.
fn check_range(name: &str, value: Option<f64>, min: f64, max: f64) -> Result<(), CoreError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(CoreError::Validation(format!(
            "{name} must be between {min} and {max}, got {v}"
        ))),
        _ => Ok(()),
    }
}

fn check_non_negative(name: &str, value: Option<f64>) -> Result<(), CoreError> {
    match value {
        Some(v) if v.is_nan() || v < 0.0 => {
            Err(CoreError::Validation(format!("{name} must be >= 0, got {v}")))
        }
        _ => Ok(()),
    }
}

/// Identifier a caller attaches to a request to wait for its playback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random, process-independent identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A synthesis request as stored in the work queue.
///
/// Field names are the wire names; absent optionals are omitted from the
/// JSON. Defaults are filled in by the producer before enqueue, never by the
/// worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaking_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_dynamics: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leading_silence_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_silence_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_break_silence_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,
    #[serde(
        default,
        rename = "requestId",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_id: Option<RequestId>,
}

impl SpeechRequest {
    /// Request with only the text set.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Set the pre-synthesis delay, clamped to [`MAX_WAIT_MS`].
    #[must_use]
    pub fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = Some(wait_ms.min(MAX_WAIT_MS));
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Delay to apply before synthesis, if any.
    ///
    /// Clamped again here because the payload may come from an older
    /// producer or be hand-written into the queue.
    pub fn pre_delay(&self) -> Option<Duration> {
        self.wait_ms
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms.min(MAX_WAIT_MS)))
    }

    /// Reject requests the worker could never render or the API would
    /// refuse. `wait_ms` is not checked; it is clamped instead.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.text.trim().is_empty() {
            return Err(CoreError::Validation("text must not be empty".to_string()));
        }
        if let Some(id) = self.style_id {
            if id > MAX_STYLE_ID {
                return Err(CoreError::Validation(format!(
                    "style_id must be between 0 and {MAX_STYLE_ID}, got {id}"
                )));
            }
        }
        check_range("speaking_rate", self.speaking_rate, 0.5, 2.0)?;
        check_range("emotional_intensity", self.emotional_intensity, 0.0, 2.0)?;
        check_range("tempo_dynamics", self.tempo_dynamics, 0.0, 2.0)?;
        check_range("pitch", self.pitch, -1.0, 1.0)?;
        check_range("volume", self.volume, 0.0, 2.0)?;
        check_non_negative("leading_silence_seconds", self.leading_silence_seconds)?;
        check_non_negative("trailing_silence_seconds", self.trailing_silence_seconds)?;
        check_non_negative("line_break_silence_seconds", self.line_break_silence_seconds)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Internal(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw)
            .map_err(|e| CoreError::Validation(format!("malformed queue item: {e}")))
    }
}
