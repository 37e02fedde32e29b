//! API endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use currency_announcer::api::{ApiServer, ApiState};
use currency_announcer::speech::{BackendError, BrowserTagBackend, LocalEngineBackend};
use currency_announcer::{BackendKind, Orchestrator, SpeechAnnouncer};
use tower::ServiceExt;

mod common;
use common::{MockEngine, MockInference, ScriptedBackend, jpeg_bytes};

/// Build a test API router around mock clients
fn build_test_router(labels: &[&str], announcer: SpeechAnnouncer) -> axum::Router {
    let dir = std::env::temp_dir().join("currency-announcer-api-tests");
    std::fs::create_dir_all(&dir).unwrap();

    let orchestrator = Orchestrator::new(MockInference::returning(labels), announcer, dir);
    ApiServer::new(ApiState::new(orchestrator), 0).router()
}

fn engine_announcer() -> SpeechAnnouncer {
    SpeechAnnouncer::new(vec![Box::new(LocalEngineBackend::new(MockEngine::working()))])
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_router(&[], engine_announcer());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_detect_endpoint() {
    let app = build_test_router(&["10", "500"], engine_announcer());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/detect?name=note.jpg")
                .header(header::CONTENT_TYPE, "image/jpeg")
                .body(Body::from(jpeg_bytes()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "note.jpg");
    assert_eq!(json["label"], "500");
    assert_eq!(json["detections"].as_array().unwrap().len(), 2);
    assert_eq!(json["detections"][1]["class"], "500");
    assert!(json["annotated_image"].is_string());
    assert_eq!(json["announcement"]["outcome"]["status"], "played");
    assert_eq!(json["announcement"]["outcome"]["backend"], "local-engine");
    assert!(json["notices"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_detect_nothing_still_returns_label() {
    let announcer = SpeechAnnouncer::new(vec![
        ScriptedBackend::failing(BackendKind::RemoteVoice, BackendError::ConfigMissing("key".into())).0,
        ScriptedBackend::failing(BackendKind::LocalEngine, BackendError::Engine("no device".into())).0,
    ]);
    let app = build_test_router(&[], announcer);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/detect")
                .header(header::CONTENT_TYPE, "image/png")
                .body(Body::from(vec![0x89, b'P', b'N', b'G']))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["label"], "Nothing");
    assert_eq!(json["announcement"]["outcome"]["status"], "silent");
    assert_eq!(json["announcement"]["outcome"]["reason"], "all_backends_exhausted");

    let notices = json["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 3);
    assert_eq!(notices[0]["level"], "info");
    assert_eq!(notices[1]["level"], "warning");
}

#[tokio::test]
async fn test_detect_rejects_unsupported_format() {
    let app = build_test_router(&["10"], engine_announcer());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/detect")
                .header(header::CONTENT_TYPE, "image/gif")
                .body(Body::from("GIF89a"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "unsupported_image");
}

#[tokio::test]
async fn test_detect_rejects_empty_body() {
    let app = build_test_router(&["10"], engine_announcer());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/detect")
                .header(header::CONTENT_TYPE, "image/jpeg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_speak_endpoint_returns_markup() {
    let announcer = SpeechAnnouncer::new(vec![Box::new(BrowserTagBackend::new(
        "https://translate.google.com",
        "en",
    ))]);
    let app = build_test_router(&[], announcer);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/speak")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"text": "The detected currency is 20"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["announcement"]["outcome"]["status"], "unverified");
    let markup = json["announcement"]["outcome"]["markup"].as_str().unwrap();
    assert!(markup.contains("<audio autoplay"));
}

#[tokio::test]
async fn test_speak_rejects_blank_text() {
    let app = build_test_router(&[], engine_announcer());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/speak")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"text": "  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_speech_backends_endpoint() {
    let app = build_test_router(&[], engine_announcer());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/speech/backends")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["backends"], serde_json::json!(["local-engine"]));
}
