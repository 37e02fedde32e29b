//! TOML configuration file loading
//!
//! Supports `~/.config/currency-announcer/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults and is itself overridden by environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AnnouncerConfigFile {
    /// Hosted inference configuration
    #[serde(default)]
    pub inference: InferenceFileConfig,

    /// Speech fallback chain configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Audio output configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Hosted object-detection model
#[derive(Debug, Default, Deserialize)]
pub struct InferenceFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Model identifier (e.g. "indian-currency-detection-elfyf")
    pub model: Option<String>,
    pub version: Option<u32>,
    /// Minimum confidence percentage (0-100)
    pub confidence: Option<u8>,
    /// Maximum box overlap percentage (0-100)
    pub overlap: Option<u8>,
}

/// Speech chain configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Backend priority, highest first (e.g. `["remote-voice", "local-engine"]`)
    pub backends: Option<Vec<String>>,

    /// Language code for translate-based backends
    pub language: Option<String>,

    /// Host serving `translate_tts`
    pub translate_host: Option<String>,

    #[serde(default)]
    pub elevenlabs: ElevenLabsFileConfig,

    #[serde(default)]
    pub engine: EngineFileConfig,
}

/// Remote premium voice service
#[derive(Debug, Default, Deserialize)]
pub struct ElevenLabsFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,
}

/// Local synthesis engine
#[derive(Debug, Default, Deserialize)]
pub struct EngineFileConfig {
    /// Path or name of the `espeak-ng` binary
    pub binary: Option<String>,
}

/// Audio output
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// External player command; unset plays through the default output device
    pub player: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory for annotated images
    pub output_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `AnnouncerConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> AnnouncerConfigFile {
    config_file_path().map_or_else(AnnouncerConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> AnnouncerConfigFile {
    if !path.exists() {
        return AnnouncerConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                AnnouncerConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            AnnouncerConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/currency-announcer/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("currency-announcer")
            .join("config.toml")
    })
}
