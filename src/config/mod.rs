//! Configuration management for the currency announcer

pub mod file;

use std::path::PathBuf;

use secrecy::SecretString;

use crate::speech::BackendKind;
use crate::{Error, Result};

use file::AnnouncerConfigFile;

/// Default hosted inference endpoint
pub const DEFAULT_INFERENCE_URL: &str = "https://detect.roboflow.com";

/// Default currency detection model
pub const DEFAULT_MODEL: &str = "indian-currency-detection-elfyf";

/// Default remote voice endpoint
pub const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io";

/// Default remote voice
pub const DEFAULT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";

/// Default host for translate-based speech
pub const DEFAULT_TRANSLATE_HOST: &str = "https://translate.google.com";

/// Announcer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Hosted inference configuration
    pub inference: InferenceConfig,

    /// Speech fallback chain configuration
    pub speech: SpeechConfig,

    /// Audio output configuration
    pub audio: AudioConfig,

    /// Directory annotated images are written to
    pub output_dir: PathBuf,

    /// HTTP API port
    pub port: u16,
}

/// Hosted object-detection model configuration
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// API key; detection cannot run without it
    pub api_key: Option<SecretString>,

    /// Endpoint base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Model version
    pub version: u32,

    /// Minimum confidence percentage
    pub confidence: u8,

    /// Maximum overlap percentage
    pub overlap: u8,
}

/// Speech fallback chain configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Backends in priority order, highest first
    pub backends: Vec<BackendKind>,

    /// Language code for translate-based backends
    pub language: String,

    /// Host serving `translate_tts`
    pub translate_host: String,

    /// Remote premium voice service
    pub elevenlabs: ElevenLabsConfig,

    /// Local synthesis engine binary
    pub engine_binary: String,
}

/// Remote premium voice configuration
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    /// API key; absence skips the backend
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
    /// Voice stability in [0, 1]
    pub stability: f32,
    /// Similarity boost in [0, 1]
    pub similarity_boost: f32,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_ELEVENLABS_URL.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.4,
            similarity_boost: 0.8,
        }
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    /// External player command (e.g. "mpg123 -q"); `None` uses the output device
    pub player: Option<String>,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// Priority is env > file > default.
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_sources<F>(fc: AnnouncerConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let inference = InferenceConfig {
            api_key: env("ROBOFLOW_API_KEY")
                .or(fc.inference.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            base_url: env("ROBOFLOW_API_URL")
                .or(fc.inference.base_url)
                .unwrap_or_else(|| DEFAULT_INFERENCE_URL.to_string()),
            model: env("ROBOFLOW_MODEL")
                .or(fc.inference.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            version: env("ROBOFLOW_VERSION")
                .and_then(|s| s.parse().ok())
                .or(fc.inference.version)
                .unwrap_or(1),
            confidence: fc.inference.confidence.unwrap_or(40),
            overlap: fc.inference.overlap.unwrap_or(30),
        };

        let backends = env("ANNOUNCER_TTS_BACKENDS")
            .map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
            .or(fc.speech.backends)
            .map_or_else(|| BackendKind::ALL.to_vec(), |names| parse_backends(&names));

        let el = fc.speech.elevenlabs;
        let defaults = ElevenLabsConfig::default();
        let elevenlabs = ElevenLabsConfig {
            api_key: env("ELEVENLABS_API_KEY")
                .or(el.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            base_url: env("ELEVENLABS_API_URL")
                .or(el.base_url)
                .unwrap_or(defaults.base_url),
            voice_id: env("ELEVENLABS_VOICE_ID")
                .or(el.voice_id)
                .unwrap_or(defaults.voice_id),
            model_id: el.model_id.unwrap_or(defaults.model_id),
            stability: el.stability.unwrap_or(defaults.stability),
            similarity_boost: el.similarity_boost.unwrap_or(defaults.similarity_boost),
        };

        let speech = SpeechConfig {
            backends,
            language: env("ANNOUNCER_TTS_LANG")
                .or(fc.speech.language)
                .unwrap_or_else(|| "en".to_string()),
            translate_host: fc
                .speech
                .translate_host
                .unwrap_or_else(|| DEFAULT_TRANSLATE_HOST.to_string()),
            elevenlabs,
            engine_binary: env("ESPEAK_BIN")
                .or(fc.speech.engine.binary)
                .unwrap_or_else(|| "espeak-ng".to_string()),
        };

        let audio = AudioConfig {
            player: env("ANNOUNCER_AUDIO_PLAYER")
                .or(fc.audio.player)
                .filter(|p| !p.trim().is_empty()),
        };

        let output_dir = env("ANNOUNCER_OUTPUT_DIR")
            .or(fc.server.output_dir)
            .map_or_else(|| PathBuf::from("."), PathBuf::from);

        let port = env("ANNOUNCER_PORT")
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(8501);

        let config = Self {
            inference,
            speech,
            audio,
            output_dir,
            port,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first out-of-range value
    pub fn validate(&self) -> Result<()> {
        let el = &self.speech.elevenlabs;
        if !(0.0..=1.0).contains(&el.stability) {
            return Err(Error::Config(format!(
                "stability must be within [0, 1], got {}",
                el.stability
            )));
        }
        if !(0.0..=1.0).contains(&el.similarity_boost) {
            return Err(Error::Config(format!(
                "similarity_boost must be within [0, 1], got {}",
                el.similarity_boost
            )));
        }
        if self.inference.confidence > 100 || self.inference.overlap > 100 {
            return Err(Error::Config(
                "confidence and overlap are percentages (0-100)".to_string(),
            ));
        }
        if self.speech.backends.is_empty() {
            tracing::warn!("no speech backends configured, announcements will be silent");
        }
        Ok(())
    }
}

/// Parse backend names, dropping unknown and repeated entries
fn parse_backends(names: &[String]) -> Vec<BackendKind> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names.iter().filter(|n| !n.is_empty()) {
        match name.parse::<BackendKind>() {
            Ok(kind) if kinds.contains(&kind) => {
                tracing::warn!(backend = %kind, "backend listed twice, keeping first position");
            }
            Ok(kind) => kinds.push(kind),
            Err(e) => tracing::warn!(error = %e, "ignoring speech backend"),
        }
    }
    kinds
}
