use std::time::Instant;

use aivis_core::{AppConfig, PlaybackReport, SpeechError, SpeechRenderer, SpeechRequest};
use async_trait::async_trait;
use tracing::debug;

use super::client::SynthesisClient;
use super::player::find_player;

/// [`SpeechRenderer`] that streams cloud synthesis straight into a local
/// player.
#[derive(Debug, Clone)]
pub struct CloudSpeechPipeline {
    client: SynthesisClient,
}

impl CloudSpeechPipeline {
    pub fn new() -> Result<Self, SpeechError> {
        Ok(Self {
            client: SynthesisClient::new()?,
        })
    }
}

#[async_trait]
impl SpeechRenderer for CloudSpeechPipeline {
    async fn render(
        &self,
        request: &SpeechRequest,
        config: &AppConfig,
    ) -> Result<PlaybackReport, SpeechError> {
        let started = Instant::now();
        if !config.has_api_key() {
            return Err(SpeechError::MissingApiKey);
        }
        // Resolve the player first so a missing one costs no API call.
        let player = find_player()?;
        debug!(player = %player.name, "Using audio player");

        let response = self.client.synthesize(request, config).await?;
        let bytes = player.play(Box::pin(response.bytes_stream())).await?;

        Ok(PlaybackReport {
            player: player.name,
            bytes,
            elapsed: started.elapsed(),
        })
    }
}
