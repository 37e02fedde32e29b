//! Currency Announcer - spoken currency note detection
//!
//! An image is classified by a hosted object-detection model, the detected
//! note is displayed, and its denomination is spoken through a fallback
//! chain of text-to-speech backends.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │            CLI  │  HTTP API (upload, speak)         │
//! └────────────────────────┬───────────────────────────┘
//!                          │
//! ┌────────────────────────▼───────────────────────────┐
//! │                   Orchestrator                      │
//! │   validate → predict → save annotated → announce    │
//! └───────────┬───────────────────────────┬────────────┘
//!             │                           │
//! ┌───────────▼──────────┐  ┌─────────────▼────────────────────────┐
//! │   InferenceClient    │  │          SpeechAnnouncer              │
//! │  (hosted detection)  │  │ remote → translate → engine → browser │
//! └──────────────────────┘  └──────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod config;
pub mod detection;
pub mod error;
pub mod orchestrator;
pub mod speech;

pub use config::Config;
pub use detection::{
    Detection, DetectionResult, ImageFormat, InferenceClient, NOTHING_LABEL, RoboflowClient,
    select_label,
};
pub use error::{Error, Result};
pub use orchestrator::{ImageUpload, Interaction, Orchestrator};
pub use speech::{
    Announcement, AnnouncementOutcome, BackendError, BackendKind, SilentReason, SpeechAnnouncer,
    SpeechBackend,
};
