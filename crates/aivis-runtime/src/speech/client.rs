//! HTTP client for the cloud synthesis endpoint.

use std::time::Duration;

use aivis_core::{AppConfig, SpeechError, SpeechRequest};
use serde_json::{Map, Value, json};
use tracing::debug;

/// Short lead-in so the first syllable is not clipped by player start-up.
pub const BREAK_PREFIX: &str = r#"<break time="500ms"/>"#;

pub const OUTPUT_FORMAT: &str = "mp3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SynthesisClient {
    http: reqwest::Client,
}

impl SynthesisClient {
    pub fn new() -> Result<Self, SpeechError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SpeechError::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn endpoint(config: &AppConfig) -> String {
        format!("{}/tts/synthesize", config.api_url.trim_end_matches('/'))
    }

    /// JSON body for `request`. Absent fields are left out; the model falls
    /// back to the configured default.
    pub fn request_body(request: &SpeechRequest, config: &AppConfig) -> Value {
        let mut body = Map::new();
        let model = request
            .model_uuid
            .clone()
            .unwrap_or_else(|| config.model_uuid.clone());
        body.insert("model_uuid".into(), json!(model));
        body.insert("text".into(), json!(format!("{BREAK_PREFIX}{}", request.text)));
        body.insert("output_format".into(), json!(OUTPUT_FORMAT));

        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                body.insert(key.to_string(), value);
            }
        };
        put("style_id", request.style_id.map(Value::from));
        put("style_name", request.style_name.clone().map(Value::from));
        put("speaking_rate", request.speaking_rate.map(Value::from));
        put("emotional_intensity", request.emotional_intensity.map(Value::from));
        put("tempo_dynamics", request.tempo_dynamics.map(Value::from));
        put("pitch", request.pitch.map(Value::from));
        put("volume", request.volume.map(Value::from));
        put("leading_silence_seconds", request.leading_silence_seconds.map(Value::from));
        put("trailing_silence_seconds", request.trailing_silence_seconds.map(Value::from));
        put(
            "line_break_silence_seconds",
            request.line_break_silence_seconds.map(Value::from),
        );

        Value::Object(body)
    }

    /// Start synthesis. The returned response body is the audio stream.
    pub async fn synthesize(
        &self,
        request: &SpeechRequest,
        config: &AppConfig,
    ) -> Result<reqwest::Response, SpeechError> {
        if !config.has_api_key() {
            return Err(SpeechError::MissingApiKey);
        }

        let url = Self::endpoint(config);
        debug!(%url, chars = request.text.chars().count(), "Requesting synthesis");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&config.api_key)
            .json(&Self::request_body(request, config))
            .send()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}
