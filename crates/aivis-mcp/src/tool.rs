//! The `aivis-speech` tool: schema, argument parsing and validation.

use aivis_core::{AppConfig, CoreError, MAX_STYLE_ID, MAX_WAIT_MS, RequestId, SpeechRequest};
use serde::Deserialize;
use serde_json::{Value, json};

pub const TOOL_NAME: &str = "aivis-speech";

/// Arguments of a `tools/call` for [`TOOL_NAME`].
///
/// Integer arguments are taken as `f64`: JSON clients may send `3.0`, and a
/// negative or fractional value is reported as out of range rather than as a
/// type error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeechToolArgs {
    pub text: String,
    #[serde(default)]
    pub model_uuid: Option<String>,
    #[serde(default)]
    pub style_id: Option<f64>,
    #[serde(default)]
    pub style_name: Option<String>,
    #[serde(default)]
    pub speaking_rate: Option<f64>,
    #[serde(default)]
    pub emotional_intensity: Option<f64>,
    #[serde(default)]
    pub tempo_dynamics: Option<f64>,
    #[serde(default)]
    pub pitch: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub leading_silence_seconds: Option<f64>,
    #[serde(default)]
    pub trailing_silence_seconds: Option<f64>,
    #[serde(default)]
    pub line_break_silence_seconds: Option<f64>,
    #[serde(default)]
    pub wait_ms: Option<f64>,
    #[serde(default)]
    pub wait_for_playback: bool,
}

impl SpeechToolArgs {
    /// Parse `arguments`; a missing object is treated as empty.
    pub fn from_value(arguments: Option<Value>) -> Result<Self, String> {
        let arguments = arguments.unwrap_or_else(|| json!({}));
        serde_json::from_value(arguments).map_err(|e| format!("invalid arguments: {e}"))
    }

    /// Checks on the integer arguments; the payload checks the rest.
    fn validate_integers(&self) -> Result<(), String> {
        if let Some(id) = self.style_id {
            if whole_number(id, u64::from(MAX_STYLE_ID)).is_none() {
                return Err(format!(
                    "style_id must be an integer between 0 and {MAX_STYLE_ID}, got {id}"
                ));
            }
        }
        if let Some(ms) = self.wait_ms {
            if whole_number(ms, MAX_WAIT_MS).is_none() {
                return Err(format!(
                    "wait_ms must be an integer between 0 and {MAX_WAIT_MS}, got {ms}"
                ));
            }
        }
        Ok(())
    }

    /// Validated queue payload with the configured defaults filled in.
    pub fn into_request(self, config: &AppConfig) -> Result<SpeechRequest, String> {
        self.validate_integers()?;
        let request = self.build(config);
        request.validate().map_err(|e| match e {
            CoreError::Validation(msg) => msg,
            other => other.to_string(),
        })?;
        Ok(request)
    }

    /// Only a call that waits for playback gets a request id.
    fn build(self, config: &AppConfig) -> SpeechRequest {
        let mut request = SpeechRequest::new(self.text);
        request.model_uuid = self.model_uuid.filter(|m| !m.is_empty());
        request.style_id = self
            .style_id
            .and_then(|id| whole_number(id, u64::from(MAX_STYLE_ID)))
            .and_then(|id| u32::try_from(id).ok());
        request.style_name = self.style_name;
        request.speaking_rate = self.speaking_rate;
        request.emotional_intensity = self.emotional_intensity;
        request.tempo_dynamics = self.tempo_dynamics;
        request.pitch = self.pitch;
        request.volume = self.volume;
        request.leading_silence_seconds = self.leading_silence_seconds;
        request.trailing_silence_seconds = self.trailing_silence_seconds;
        request.line_break_silence_seconds = self.line_break_silence_seconds;

        let mut request = config.apply_defaults(request);
        if let Some(ms) = self.wait_ms.and_then(|ms| whole_number(ms, MAX_WAIT_MS)) {
            request = request.with_wait_ms(ms);
        }
        if self.wait_for_playback {
            request = request.with_request_id(RequestId::generate());
        }
        request
    }
}

/// `value` as an integer in `0..=max`, if it is one.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn whole_number(value: f64, max: u64) -> Option<u64> {
    let in_range = value.is_finite() && value >= 0.0 && value <= max as f64;
    (in_range && value.fract() == 0.0).then(|| value as u64)
}

/// Entry for `tools/list`.
pub fn definition() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Speak text aloud with Aivis Cloud speech synthesis. \
            Requests are queued and played one at a time; the call returns as soon as \
            the text is queued unless wait_for_playback is set.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to speak" },
                "model_uuid": { "type": "string", "description": "Voice model UUID" },
                "style_id": { "type": "integer", "minimum": 0, "maximum": 31, "description": "Style ID (0-31)" },
                "style_name": { "type": "string", "description": "Style name" },
                "speaking_rate": { "type": "number", "minimum": 0.5, "maximum": 2.0, "description": "Speaking rate (0.5-2.0)" },
                "emotional_intensity": { "type": "number", "minimum": 0.0, "maximum": 2.0, "description": "Emotional intensity (0.0-2.0)" },
                "tempo_dynamics": { "type": "number", "minimum": 0.0, "maximum": 2.0, "description": "Tempo dynamics (0.0-2.0)" },
                "pitch": { "type": "number", "minimum": -1.0, "maximum": 1.0, "description": "Pitch (-1.0-1.0)" },
                "volume": { "type": "number", "minimum": 0.0, "maximum": 2.0, "description": "Volume (0.0-2.0)" },
                "leading_silence_seconds": { "type": "number", "minimum": 0.0, "description": "Silence before the speech (seconds)" },
                "trailing_silence_seconds": { "type": "number", "minimum": 0.0, "description": "Silence after the speech (seconds)" },
                "line_break_silence_seconds": { "type": "number", "minimum": 0.0, "description": "Silence at line breaks (seconds)" },
                "wait_ms": { "type": "integer", "minimum": 0, "maximum": MAX_WAIT_MS, "description": "Delay before synthesis (ms)" },
                "wait_for_playback": { "type": "boolean", "description": "Return only after playback has finished" }
            },
            "required": ["text"]
        }
    })
}

/// `tools/call` result body.
pub fn text_result(text: impl Into<String>, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text.into() }],
        "isError": is_error
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> SpeechToolArgs {
        SpeechToolArgs::from_value(Some(value)).unwrap()
    }

    #[test]
    fn text_is_required() {
        let err = SpeechToolArgs::from_value(Some(json!({ "pitch": 0.1 }))).unwrap_err();
        assert!(err.contains("text"));
        assert!(args(json!({ "text": "   " })).into_request(&AppConfig::default()).is_err());
    }

    #[test]
    fn accepts_bounds() {
        let a = args(json!({
            "text": "hi",
            "style_id": 31,
            "speaking_rate": 0.5,
            "pitch": -1.0,
            "volume": 2.0,
            "leading_silence_seconds": 0.0,
            "wait_ms": 60000
        }));
        assert!(a.into_request(&AppConfig::default()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in [
            json!({ "text": "hi", "style_id": 32 }),
            json!({ "text": "hi", "style_id": -1 }),
            json!({ "text": "hi", "style_id": 2.5 }),
            json!({ "text": "hi", "wait_ms": 10.25 }),
            json!({ "text": "hi", "speaking_rate": 2.5 }),
            json!({ "text": "hi", "emotional_intensity": -0.1 }),
            json!({ "text": "hi", "pitch": 1.5 }),
            json!({ "text": "hi", "trailing_silence_seconds": -1.0 }),
            json!({ "text": "hi", "wait_ms": 60001 }),
        ] {
            let result = args(bad.clone()).into_request(&AppConfig::default());
            assert!(result.is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn request_inherits_configured_defaults() {
        let config = AppConfig {
            speaking_rate: Some(1.2),
            ..AppConfig::default()
        };
        let request = args(json!({ "text": "hi", "pitch": 0.3, "wait_ms": 250 }))
            .into_request(&config)
            .unwrap();
        assert_eq!(request.text, "hi");
        assert_eq!(request.model_uuid.as_deref(), Some(config.model_uuid.as_str()));
        assert_eq!(request.speaking_rate, Some(1.2));
        assert_eq!(request.pitch, Some(0.3));
        assert_eq!(request.wait_ms, Some(250));
        assert!(request.request_id.is_none());
    }

    #[test]
    fn waiting_calls_get_a_request_id() {
        let request = args(json!({ "text": "hi", "wait_for_playback": true }))
            .into_request(&AppConfig::default())
            .unwrap();
        assert!(request.request_id.is_some());
    }

    #[test]
    fn schema_lists_the_tool() {
        let def = definition();
        assert_eq!(def["name"], TOOL_NAME);
        assert_eq!(def["inputSchema"]["required"], json!(["text"]));
        assert_eq!(def["inputSchema"]["properties"]["style_id"]["maximum"], 31);
    }

    #[test]
    fn integral_floats_count_as_integers() {
        let request = args(json!({ "text": "hi", "style_id": 3.0, "wait_ms": 1000.0 }))
            .into_request(&AppConfig::default())
            .unwrap();
        assert_eq!(request.style_id, Some(3));
        assert_eq!(request.wait_ms, Some(1000));
    }
}
