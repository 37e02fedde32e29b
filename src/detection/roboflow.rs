//! Roboflow hosted inference client

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{Detection, DetectionResult, ImageDimensions, ImageFormat, InferenceClient};
use crate::config::InferenceConfig;
use crate::{Error, Result};

/// Client for a model hosted on `detect.roboflow.com`
pub struct RoboflowClient {
    client: Client,
    api_key: SecretString,
    endpoint: String,
    confidence: u8,
    overlap: u8,
}

impl RoboflowClient {
    /// Create a client from inference configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::Config("ROBOFLOW_API_KEY is required for currency detection".to_string())
        })?;

        let endpoint = format!(
            "{}/{}/{}",
            config.base_url.trim_end_matches('/'),
            config.model,
            config.version
        );

        Ok(Self {
            client: Client::new(),
            api_key,
            endpoint,
            confidence: config.confidence,
            overlap: config.overlap,
        })
    }

    /// Base query shared by both requests
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("api_key", self.api_key.expose_secret().to_string()),
            ("confidence", self.confidence.to_string()),
            ("overlap", self.overlap.to_string()),
        ]
    }

    async fn post(&self, body: String, extra: &[(&'static str, &str)]) -> Result<reqwest::Response> {
        let mut query = self.query();
        query.extend(extra.iter().map(|(k, v)| (*k, (*v).to_string())));

        let response = self
            .client
            .post(&self.endpoint)
            .query(&query)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!("{status}: {body}")));
        }

        Ok(response)
    }

    /// Fetch the provider-rendered annotated image
    async fn annotate(&self, encoded: String) -> Result<Vec<u8>> {
        let response = self
            .post(encoded, &[("format", "image"), ("labels", "on")])
            .await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl InferenceClient for RoboflowClient {
    async fn predict(&self, image: &[u8], format: ImageFormat) -> Result<DetectionResult> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        tracing::debug!(
            endpoint = %self.endpoint,
            mime = format.mime(),
            bytes = image.len(),
            "requesting prediction"
        );

        let response = self.post(encoded.clone(), &[]).await?;
        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("failed to parse response: {e}")))?;

        let annotated = match self.annotate(encoded).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "annotated image unavailable");
                None
            }
        };

        tracing::debug!(predictions = parsed.predictions.len(), "prediction complete");

        Ok(DetectionResult {
            predictions: parsed.predictions,
            image: parsed.image.map(|i| ImageDimensions {
                width: i.width,
                height: i.height,
            }),
            annotated,
        })
    }

    fn name(&self) -> &'static str {
        "roboflow"
    }
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Detection>,
    #[serde(default)]
    image: Option<ImageInfo>,
}

#[derive(Deserialize)]
struct ImageInfo {
    #[serde(deserialize_with = "dimension")]
    width: u32,
    #[serde(deserialize_with = "dimension")]
    height: u32,
}

/// Dimensions arrive as either numbers or numeric strings
fn dimension<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
