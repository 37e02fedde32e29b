//! Client-rendered audio tag backend

use async_trait::async_trait;

use super::{BackendError, BackendKind, Delivery, SpeechBackend};

/// Emits an autoplaying `<audio>` element pointing at `translate_tts`
///
/// The client fetches and plays the audio, so success is never confirmed
/// here; the backend always reports an unverified delivery.
pub struct BrowserTagBackend {
    host: String,
    language: String,
}

impl BrowserTagBackend {
    #[must_use]
    pub fn new(host: &str, language: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }

    /// Audio URL for `text`
    #[must_use]
    pub fn audio_url(&self, text: &str) -> String {
        format!(
            "{}/translate_tts?ie=UTF-8&client=tw-ob&tl={}&q={}",
            self.host,
            urlencoding::encode(&self.language),
            urlencoding::encode(text)
        )
    }

    /// Markup for an autoplaying audio element
    #[must_use]
    pub fn markup(&self, text: &str) -> String {
        let src = self.audio_url(text).replace('&', "&amp;");
        format!(r#"<audio autoplay src="{src}"></audio>"#)
    }
}

#[async_trait]
impl SpeechBackend for BrowserTagBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::BrowserTag
    }

    async fn speak(&self, text: &str) -> Result<Delivery, BackendError> {
        Ok(Delivery::Unverified {
            markup: self.markup(text),
        })
    }
}
