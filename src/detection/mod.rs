//! Currency detection through a hosted object-detection model
//!
//! Only the contract consumed by the orchestrator lives here: an image goes
//! in, an ordered list of detections (plus an optional provider-rendered
//! annotated image) comes out.

mod roboflow;

pub use roboflow::RoboflowClient;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Label used when the model finds nothing
pub const NOTHING_LABEL: &str = "Nothing";

/// Axis-aligned box in image pixels, centred on (`x`, `y`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// One classified region of an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label reported by the model (e.g. "500")
    #[serde(rename = "class")]
    pub label: String,

    /// Model confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,

    #[serde(flatten)]
    pub bbox: BoundingBox,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_id: Option<String>,
}

impl Detection {
    /// Create a detection with an empty bounding box
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: BoundingBox::default(),
            class_id: None,
            detection_id: None,
        }
    }
}

/// Dimensions of the image the model processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Everything the model returned for one image
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    /// Detections in the order the service reported them
    pub predictions: Vec<Detection>,

    /// Size of the processed image, when reported
    pub image: Option<ImageDimensions>,

    /// Annotated JPEG rendered by the provider
    pub annotated: Option<Vec<u8>>,
}

impl DetectionResult {
    /// Create a result from predictions alone
    #[must_use]
    pub fn from_predictions(predictions: Vec<Detection>) -> Self {
        Self {
            predictions,
            ..Self::default()
        }
    }

    /// Label to announce for this result
    #[must_use]
    pub fn label(&self) -> &str {
        select_label(&self.predictions)
    }

    /// Write the annotated image to `path`
    ///
    /// # Errors
    ///
    /// Returns error if the provider returned no annotated image or the file
    /// cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self
            .annotated
            .as_deref()
            .ok_or_else(|| Error::Media("no annotated image returned by the model".to_string()))?;
        std::fs::write(path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved annotated image");
        Ok(())
    }
}

/// Pick the label to announce: the last detection reported, not the most confident
#[must_use]
pub fn select_label(predictions: &[Detection]) -> &str {
    predictions
        .last()
        .map_or(NOTHING_LABEL, |d| d.label.as_str())
}

/// Hosted image classifier
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Run the model on an encoded image
    ///
    /// # Errors
    ///
    /// Returns error if the service cannot be reached or rejects the image
    async fn predict(&self, image: &[u8], format: ImageFormat) -> Result<DetectionResult>;

    /// Client name for logging
    fn name(&self) -> &'static str;
}

/// Image formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// Map a file extension (`png`, `jpg`, `jpeg`, `webp`)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Map a MIME type, ignoring parameters
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detect the format from a file name's extension
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedImage` for any other extension
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                Error::UnsupportedImage(format!(
                    "{} (expected png, jpg, jpeg or webp)",
                    path.display()
                ))
            })
    }

    /// MIME type for this format
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_last_not_most_confident() {
        let predictions = vec![
            Detection::new("2000", 0.97),
            Detection::new("10", 0.41),
        ];
        assert_eq!(select_label(&predictions), "10");
    }

    #[test]
    fn test_select_empty_is_nothing() {
        assert_eq!(select_label(&[]), NOTHING_LABEL);
        assert_eq!(DetectionResult::default().label(), "Nothing");
    }

    #[test]
    fn test_detection_wire_format() {
        let json = r#"{
            "x": 320.5, "y": 240.0, "width": 100.0, "height": 50.0,
            "confidence": 0.88, "class": "500", "class_id": 4,
            "detection_id": "abc", "points": []
        }"#;
        let detection: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(detection.label, "500");
        assert_eq!(detection.class_id, Some(4));
        assert!((detection.bbox.x - 320.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_save_without_annotation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = DetectionResult::from_predictions(vec![Detection::new("50", 0.9)]);
        let err = result.save(&dir.path().join("out.jpg")).unwrap_err();
        assert!(matches!(err, Error::Media(_)));
    }

    #[test]
    fn test_save_writes_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated_note.jpg");
        let result = DetectionResult {
            annotated: Some(vec![0xFF, 0xD8, 0xFF]),
            ..DetectionResult::default()
        };
        result.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_image_formats() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("webp"), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::from_extension("gif"), None);
        assert_eq!(
            ImageFormat::from_mime("image/png; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime("video/mp4"), None);
        assert!(ImageFormat::from_path(Path::new("note.bmp")).is_err());
        assert_eq!(
            ImageFormat::from_path(Path::new("note.jpeg")).unwrap(),
            ImageFormat::Jpeg
        );
    }
}
