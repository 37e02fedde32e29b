//! Detection and speech endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::Error;
use crate::detection::Detection;
use crate::orchestrator::ImageUpload;
use crate::speech::{Announcement, BackendKind, Notice};

/// Build detection/speech router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/detect", post(detect))
        .route("/speak", post(speak))
        .route("/speech/backends", get(backends))
        .with_state(state)
}

/// Query parameters for `/detect`
#[derive(Debug, Deserialize)]
pub struct DetectParams {
    /// Original file name
    pub name: Option<String>,
}

/// Detection response
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub name: String,
    pub label: String,
    pub detections: Vec<Detection>,
    /// Base64 JPEG rendered by the model provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image: Option<String>,
    pub announcement: Announcement,
    pub notices: Vec<Notice>,
}

/// Detect currency in the request body
///
/// Accepts a raw png, jpeg or webp body; the `Content-Type` header selects the format.
async fn detect(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<DetectParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DetectResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Empty image data".to_string()));
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let name = params.name.unwrap_or_else(|| "upload.jpg".to_string());
    let upload = ImageUpload::from_mime(name, mime, body.to_vec())?;

    let orchestrator = state.orchestrator.lock().await;
    let interaction = orchestrator.process(upload).await?;
    drop(orchestrator);

    let annotated_image = interaction
        .result
        .annotated
        .as_deref()
        .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes));
    let notices = interaction.announcement.notices();

    Ok(Json(DetectResponse {
        name: interaction.name,
        label: interaction.label,
        detections: interaction.result.predictions,
        annotated_image,
        announcement: interaction.announcement,
        notices,
    }))
}

/// Speech request
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
}

/// Speech response
#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    pub announcement: Announcement,
    pub notices: Vec<Notice>,
}

/// Announce arbitrary text through the fallback chain
async fn speak(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Empty text".to_string()));
    }

    let orchestrator = state.orchestrator.lock().await;
    let announcement = orchestrator.announcer().announce(&request.text).await;
    drop(orchestrator);

    let notices = announcement.notices();
    Ok(Json(SpeakResponse {
        announcement,
        notices,
    }))
}

/// Configured speech chain
#[derive(Debug, Serialize)]
pub struct BackendsResponse {
    pub backends: Vec<BackendKind>,
}

async fn backends(State(state): State<Arc<ApiState>>) -> Json<BackendsResponse> {
    let backends = state.orchestrator.lock().await.announcer().chain();
    Json(BackendsResponse { backends })
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    UnsupportedMedia(String),
    Upstream(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::UnsupportedImage(msg) => Self::UnsupportedMedia(msg),
            Error::Inference(_) | Error::Http(_) => Self::Upstream(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::UnsupportedMedia(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_image", msg)
            }
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "inference_failed", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
