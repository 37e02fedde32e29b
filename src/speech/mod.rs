//! Spoken announcements through an ordered chain of TTS backends
//!
//! Backends are tried highest priority first. The first one that delivers
//! audio ends the chain; every failure is recorded and the next backend is
//! tried. `announce` never returns an error: exhausting the chain yields a
//! silent outcome instead.

mod browser;
mod elevenlabs;
mod engine;
mod translate;

pub use browser::BrowserTagBackend;
pub use elevenlabs::{ElevenLabsBackend, RemoteVoice};
pub use engine::{EngineVoice, EspeakEngine, LocalEngineBackend, SpeechEngine, select_voice};
pub use translate::TranslateBackend;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::audio::AudioSink;
use crate::config::SpeechConfig;

/// Identifies a backend in config, logs and results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Remote premium voice service (needs an API key)
    RemoteVoice,
    /// Free hosted translate voice
    TranslateVoice,
    /// On-device synthesis engine
    LocalEngine,
    /// Autoplaying audio element rendered by the client
    BrowserTag,
}

impl BackendKind {
    /// Every backend, in default priority order
    pub const ALL: [Self; 4] = [
        Self::RemoteVoice,
        Self::TranslateVoice,
        Self::LocalEngine,
        Self::BrowserTag,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteVoice => "remote-voice",
            Self::TranslateVoice => "translate-voice",
            Self::LocalEngine => "local-engine",
            Self::BrowserTag => "browser-tag",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown speech backend: {s}"))
    }
}

/// Why a single backend attempt produced no audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BackendError {
    /// Backend is not configured; skipped, not a failure
    #[error("not configured: {0}")]
    ConfigMissing(String),

    /// Network failure or rejected request on a remote backend
    #[error("transport error: {0}")]
    Transport(String),

    /// Local synthesis engine failed
    #[error("engine error: {0}")]
    Engine(String),

    /// Audio was synthesized but could not be played
    #[error("playback error: {0}")]
    Playback(String),
}

impl BackendError {
    /// Whether this is an informational skip rather than a failure
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::ConfigMissing(_))
    }
}

/// What a successful backend delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Audio was played locally
    Played,
    /// Markup handed to the client; playback cannot be confirmed
    Unverified { markup: String },
}

/// A mechanism that turns text into audible output
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Make one attempt to speak `text`
    ///
    /// # Errors
    ///
    /// Returns the classified reason no audio was produced
    async fn speak(&self, text: &str) -> Result<Delivery, BackendError>;
}

/// Why an announcement produced no audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SilentReason {
    AllBackendsExhausted,
}

/// Terminal state of an announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnnouncementOutcome {
    Played { backend: BackendKind },
    Unverified { backend: BackendKind, markup: String },
    Silent { reason: SilentReason },
}

impl AnnouncementOutcome {
    /// Backend that ended the chain, if any
    #[must_use]
    pub const fn backend(&self) -> Option<BackendKind> {
        match self {
            Self::Played { backend } | Self::Unverified { backend, .. } => Some(*backend),
            Self::Silent { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::Silent { .. })
    }
}

/// One backend's turn in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<BackendError>,
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Message to surface to the user about an announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Result of one `announce` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub text: String,
    pub outcome: AnnouncementOutcome,
    pub attempts: Vec<Attempt>,
}

impl Announcement {
    /// Failures recorded along the way, in attempt order
    pub fn failures(&self) -> impl Iterator<Item = (BackendKind, &BackendError)> {
        self.attempts
            .iter()
            .filter_map(|a| a.failure.as_ref().map(|f| (a.backend, f)))
    }

    /// Backends that were actually invoked
    #[must_use]
    pub fn invoked(&self) -> Vec<BackendKind> {
        self.attempts.iter().map(|a| a.backend).collect()
    }

    /// User-facing messages: skips are informational, failures are warnings
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        let mut notices: Vec<Notice> = self
            .failures()
            .map(|(backend, failure)| Notice {
                level: if failure.is_skip() {
                    NoticeLevel::Info
                } else {
                    NoticeLevel::Warning
                },
                message: format!("{backend}: {failure}"),
            })
            .collect();

        if self.outcome.is_silent() {
            notices.push(Notice {
                level: NoticeLevel::Warning,
                message: "no speech backend could play the announcement".to_string(),
            });
        }

        notices
    }
}

/// Ordered fallback chain of speech backends
///
/// The chain is fixed at construction and read-only afterwards.
pub struct SpeechAnnouncer {
    backends: Vec<Box<dyn SpeechBackend>>,
}

impl SpeechAnnouncer {
    /// Create an announcer with backends in priority order
    #[must_use]
    pub fn new(backends: Vec<Box<dyn SpeechBackend>>) -> Self {
        Self { backends }
    }

    /// Build the configured chain
    ///
    /// `sink` plays audio fetched by the remote backends.
    #[must_use]
    pub fn from_config(config: &SpeechConfig, sink: Arc<dyn AudioSink>) -> Self {
        let backends = config
            .backends
            .iter()
            .map(|kind| -> Box<dyn SpeechBackend> {
                match kind {
                    BackendKind::RemoteVoice => Box::new(ElevenLabsBackend::new(
                        &config.elevenlabs,
                        Arc::clone(&sink),
                    )),
                    BackendKind::TranslateVoice => Box::new(TranslateBackend::new(
                        &config.translate_host,
                        &config.language,
                        Arc::clone(&sink),
                    )),
                    BackendKind::LocalEngine => Box::new(LocalEngineBackend::new(Arc::new(
                        EspeakEngine::new(config.engine_binary.clone()),
                    ))),
                    BackendKind::BrowserTag => Box::new(BrowserTagBackend::new(
                        &config.translate_host,
                        &config.language,
                    )),
                }
            })
            .collect();

        Self::new(backends)
    }

    /// Configured backends in priority order
    #[must_use]
    pub fn chain(&self) -> Vec<BackendKind> {
        self.backends.iter().map(|b| b.kind()).collect()
    }

    /// Speak `text` with the first backend that succeeds
    pub async fn announce(&self, text: &str) -> Announcement {
        let mut attempts = Vec::with_capacity(self.backends.len());

        if text.trim().is_empty() {
            tracing::debug!("nothing to announce");
            return Announcement {
                text: text.to_string(),
                outcome: AnnouncementOutcome::Silent {
                    reason: SilentReason::AllBackendsExhausted,
                },
                attempts,
            };
        }

        for backend in &self.backends {
            let kind = backend.kind();
            tracing::debug!(backend = %kind, "trying speech backend");

            match backend.speak(text).await {
                Ok(delivery) => {
                    attempts.push(Attempt {
                        backend: kind,
                        failure: None,
                    });
                    let outcome = match delivery {
                        Delivery::Played => {
                            tracing::info!(backend = %kind, "announcement played");
                            AnnouncementOutcome::Played { backend: kind }
                        }
                        Delivery::Unverified { markup } => {
                            tracing::info!(backend = %kind, "announcement handed to client");
                            AnnouncementOutcome::Unverified {
                                backend: kind,
                                markup,
                            }
                        }
                    };
                    return Announcement {
                        text: text.to_string(),
                        outcome,
                        attempts,
                    };
                }
                Err(failure) => {
                    if failure.is_skip() {
                        tracing::info!(backend = %kind, reason = %failure, "skipping backend");
                    } else {
                        tracing::warn!(
                            backend = %kind,
                            error = %failure,
                            "backend failed, trying next"
                        );
                    }
                    attempts.push(Attempt {
                        backend: kind,
                        failure: Some(failure),
                    });
                }
            }
        }

        tracing::warn!(attempted = attempts.len(), "all speech backends exhausted");

        Announcement {
            text: text.to_string(),
            outcome: AnnouncementOutcome::Silent {
                reason: SilentReason::AllBackendsExhausted,
            },
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_names() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!(" Local-Engine ".parse::<BackendKind>().unwrap(), BackendKind::LocalEngine);
        assert!("gtts".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_notices_levels() {
        let announcement = Announcement {
            text: "hi".to_string(),
            outcome: AnnouncementOutcome::Silent {
                reason: SilentReason::AllBackendsExhausted,
            },
            attempts: vec![
                Attempt {
                    backend: BackendKind::RemoteVoice,
                    failure: Some(BackendError::ConfigMissing("api key".to_string())),
                },
                Attempt {
                    backend: BackendKind::LocalEngine,
                    failure: Some(BackendError::Engine("no engine".to_string())),
                },
            ],
        };

        let notices = announcement.notices();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert_eq!(notices[1].level, NoticeLevel::Warning);
        assert!(notices[1].message.starts_with("local-engine"));
        assert_eq!(notices[2].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = AnnouncementOutcome::Played {
            backend: BackendKind::TranslateVoice,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "played");
        assert_eq!(json["backend"], "translate-voice");
    }
}
