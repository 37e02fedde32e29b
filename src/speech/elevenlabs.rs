//! Remote premium voice backend (ElevenLabs)

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{BackendError, BackendKind, Delivery, SpeechBackend};
use crate::audio::{self, AudioSink};
use crate::config::ElevenLabsConfig;
use crate::{Error, Result};

/// Voice listed by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVoice {
    pub name: String,
    pub voice_id: String,
}

/// Synthesizes speech with ElevenLabs and plays it through a sink
///
/// A missing API key is not an error: the backend reports
/// `ConfigMissing` and the chain moves on.
pub struct ElevenLabsBackend {
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
    voice_id: String,
    model_id: String,
    stability: f32,
    similarity_boost: f32,
    sink: Arc<dyn AudioSink>,
}

impl ElevenLabsBackend {
    #[must_use]
    pub fn new(config: &ElevenLabsConfig, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
            sink,
        }
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` without a key, `Transport` on network failure
    /// or any non-success status
    pub async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, BackendError> {
        #[derive(Serialize)]
        struct VoiceSettings {
            stability: f32,
            similarity_boost: f32,
        }

        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| BackendError::ConfigMissing("ELEVENLABS_API_KEY not set".to_string()))?;

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model_id,
            voice_settings: VoiceSettings {
                stability: self.stability,
                similarity_boost: self.similarity_boost,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Transport(format!(
                "ElevenLabs returned {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(audio.to_vec())
    }

    /// List voices available to the configured key
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured or the request fails
    pub async fn list_voices(&self) -> Result<Vec<RemoteVoice>> {
        #[derive(Deserialize)]
        struct VoicesResponse {
            voices: Vec<RemoteVoice>,
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("ELEVENLABS_API_KEY not set".to_string()))?;

        let response = self
            .client
            .get(format!("{}/v1/voices", self.base_url))
            .header("xi-api-key", api_key.expose_secret())
            .send()
            .await?
            .error_for_status()?;

        let voices: VoicesResponse = response.json().await?;
        Ok(voices.voices)
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteVoice
    }

    async fn speak(&self, text: &str) -> std::result::Result<Delivery, BackendError> {
        let audio = self.synthesize(text).await?;
        tracing::debug!(bytes = audio.len(), voice = %self.voice_id, "remote voice synthesized");

        audio::play_blocking(Arc::clone(&self.sink), audio)
            .await
            .map_err(|e| BackendError::Playback(e.to_string()))?;

        Ok(Delivery::Played)
    }
}
