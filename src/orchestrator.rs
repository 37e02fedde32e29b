//! Upload → predict → display → speak
//!
//! The orchestrator owns the long-lived clients. It performs no recovery of
//! its own: inference failures end the interaction, while speech failures
//! are already absorbed by the announcer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::detection::{DetectionResult, ImageFormat, InferenceClient};
use crate::speech::{Announcement, SpeechAnnouncer};
use crate::{Error, Result};

/// One image handed in by the user
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Original file name, used to name the annotated copy
    pub name: String,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image file, rejecting unsupported formats before any I/O
    ///
    /// # Errors
    ///
    /// Returns error if the extension is not an accepted format or the file
    /// cannot be read
    pub fn from_path(path: &Path) -> Result<Self> {
        let format = ImageFormat::from_path(path)?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        Ok(Self {
            name,
            format,
            bytes,
        })
    }

    /// Build an upload from a MIME type and raw bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedImage` for anything but png, jpeg or webp
    pub fn from_mime(name: impl Into<String>, mime: &str, bytes: Vec<u8>) -> Result<Self> {
        let format = ImageFormat::from_mime(mime)
            .ok_or_else(|| Error::UnsupportedImage(format!("content type {mime}")))?;

        Ok(Self {
            name: name.into(),
            format,
            bytes,
        })
    }
}

/// What the user sees and hears for one image
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub name: String,
    pub label: String,
    /// Where the annotated image was saved, if the model returned one
    pub annotated_path: Option<PathBuf>,
    pub announcement: Announcement,
    #[serde(skip)]
    pub result: DetectionResult,
}

/// Drives a single detection-and-announcement cycle at a time
pub struct Orchestrator {
    inference: Arc<dyn InferenceClient>,
    announcer: SpeechAnnouncer,
    output_dir: PathBuf,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        announcer: SpeechAnnouncer,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            inference,
            announcer,
            output_dir,
        }
    }

    #[must_use]
    pub const fn announcer(&self) -> &SpeechAnnouncer {
        &self.announcer
    }

    /// Sentence spoken for a label
    #[must_use]
    pub fn announcement_text(label: &str) -> String {
        format!("The detected currency is {label}")
    }

    /// Run one image through detection and announce the result
    ///
    /// # Errors
    ///
    /// Returns error if the image is empty or the inference call fails
    pub async fn process(&self, upload: ImageUpload) -> Result<Interaction> {
        if upload.bytes.is_empty() {
            return Err(Error::UnsupportedImage(format!("{} is empty", upload.name)));
        }

        tracing::info!(
            image = %upload.name,
            client = self.inference.name(),
            "detecting currency"
        );

        let result = self.inference.predict(&upload.bytes, upload.format).await?;

        let annotated_path = self.output_dir.join(annotated_name(&upload.name));
        let annotated_path = match result.save(&annotated_path) {
            Ok(()) => Some(annotated_path),
            Err(e) => {
                tracing::warn!(image = %upload.name, error = %e, "annotated image not saved");
                None
            }
        };

        let label = result.label().to_string();
        tracing::info!(image = %upload.name, %label, detections = result.predictions.len(), "currency detected");

        let announcement = self
            .announcer
            .announce(&Self::announcement_text(&label))
            .await;

        Ok(Interaction {
            name: upload.name,
            label,
            annotated_path,
            announcement,
            result,
        })
    }

    /// Process uploads one after another, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns the first inference error
    pub async fn process_many(&self, uploads: Vec<ImageUpload>) -> Result<Vec<Interaction>> {
        let mut interactions = Vec::with_capacity(uploads.len());
        for upload in uploads {
            interactions.push(self.process(upload).await?);
        }
        Ok(interactions)
    }
}

/// `annotated_{name}`, keeping only the final path component
fn annotated_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload.jpg");
    format!("annotated_{base}")
}
