//! Free hosted translate voice backend

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{BackendError, BackendKind, Delivery, SpeechBackend};
use crate::audio::{self, AudioSink};

/// Longest text the endpoint accepts per request
const MAX_CHARS: usize = 200;

/// Fetches MP3 audio from a public `translate_tts` endpoint
///
/// Needs no credentials, so it is always available.
pub struct TranslateBackend {
    client: Client,
    host: String,
    language: String,
    sink: Arc<dyn AudioSink>,
}

impl TranslateBackend {
    #[must_use]
    pub fn new(host: &str, language: &str, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            language: language.to_string(),
            sink,
        }
    }

    fn chunk_url(&self, part: &str, idx: usize, total: usize) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!("{}/translate_tts", self.host))
            .map_err(|e| BackendError::Transport(format!("invalid translate host: {e}")))?;

        url.query_pairs_mut()
            .append_pair("ie", "UTF-8")
            .append_pair("q", part)
            .append_pair("tl", &self.language)
            .append_pair("total", &total.to_string())
            .append_pair("idx", &idx.to_string())
            .append_pair("textlen", &part.chars().count().to_string())
            .append_pair("client", "tw-ob");

        Ok(url)
    }

    /// Synthesize text to MP3 bytes, one request per chunk
    ///
    /// # Errors
    ///
    /// Returns `Transport` if any chunk fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, BackendError> {
        let parts = split_text(text, MAX_CHARS);
        let mut combined = Vec::new();

        for (idx, part) in parts.iter().enumerate() {
            let url = self.chunk_url(part, idx, parts.len())?;
            let bytes = self
                .client
                .get(url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| BackendError::Transport(e.to_string()))?
                .bytes()
                .await
                .map_err(|e| BackendError::Transport(e.to_string()))?;

            combined.extend_from_slice(&bytes);
        }

        Ok(combined)
    }
}

#[async_trait]
impl SpeechBackend for TranslateBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::TranslateVoice
    }

    async fn speak(&self, text: &str) -> Result<Delivery, BackendError> {
        let audio = self.synthesize(text).await?;
        if audio.is_empty() {
            return Err(BackendError::Transport("empty audio response".to_string()));
        }

        audio::play_blocking(Arc::clone(&self.sink), audio)
            .await
            .map_err(|e| BackendError::Playback(e.to_string()))?;

        Ok(Delivery::Played)
    }
}

/// Split text on whitespace into chunks of at most `max` characters
///
/// A single word longer than `max` is cut at character boundaries.
pub(crate) fn split_text(text: &str, max: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if current_len > 0 && current_len + 1 + word_len > max {
            parts.push(std::mem::take(&mut current));
        }

        if word_len > max {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max) {
                parts.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}
