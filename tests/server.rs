//! End-to-end tests of the HTTP surface with a stubbed extractor: routing,
//! error bodies, streaming delivery and file cleanup.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tubefetch::config::Config;
use tubefetch::dispatch::JobRegistry;
use tubefetch::extract::{ExtractError, MediaExtractor, MediaKind};
use tubefetch::normalize::MediaId;
use tubefetch::server::{build_router, AppState};

const PAYLOAD: &[u8] = b"not a real container, but plenty of bytes to stream back";

/// Succeeds by writing a fixed payload to the destination.
struct StubExtractor;

#[async_trait]
impl MediaExtractor for StubExtractor {
    async fn extract(&self, _id: &MediaId, _kind: MediaKind, dest: &Path) -> Result<(), ExtractError> {
        fs_err::write(dest, PAYLOAD).unwrap();
        Ok(())
    }
}

/// Always refuses, like yt-dlp hitting a private video.
struct RefusingExtractor;

#[async_trait]
impl MediaExtractor for RefusingExtractor {
    async fn extract(&self, _id: &MediaId, _kind: MediaKind, _dest: &Path) -> Result<(), ExtractError> {
        Err(ExtractError::ContentUnavailable)
    }
}

fn test_state(dir: &Path, extractor: Arc<dyn MediaExtractor>) -> AppState {
    let mut config = Config::default();
    config.storage.download_dir = dir.to_path_buf();

    AppState {
        config: Arc::new(config),
        registry: Arc::new(JobRegistry::new(dir).unwrap()),
        extractor,
    }
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn error_message(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    value["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_landing_is_alive() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), Arc::new(StubExtractor)));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), Arc::new(StubExtractor)));

    let response = app.oneshot(post_json("/download", "{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "URL is required");
}

#[tokio::test]
async fn test_malformed_url_is_rejected_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(RefusingExtractor));
    let registry = Arc::clone(&state.registry);
    let app = build_router(state);

    let response = app
        .oneshot(post_json("/download", r#"{"url": "not a url"}"#))
        .await
        .unwrap();

    // The refusing extractor was never reached: validation short-circuits
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("not a valid absolute URL"));
    assert_eq!(registry.live_jobs(), 0);
}

#[tokio::test]
async fn test_unsupported_link_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), Arc::new(StubExtractor)));

    let response = app
        .oneshot(post_json("/download", r#"{"url": "https://example.com/page"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("not a recognized YouTube link"));
}

#[tokio::test]
async fn test_unknown_kind_segment_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), Arc::new(StubExtractor)));

    let response = app
        .oneshot(post_json(
            "/download/gif",
            r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("unknown media kind"));
}

#[tokio::test]
async fn test_video_download_streams_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(StubExtractor));
    let registry = Arc::clone(&state.registry);
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/download/video",
            r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(
        headers[header::CONTENT_LENGTH],
        PAYLOAD.len().to_string().as_str()
    );
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("video.mp4"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PAYLOAD);

    // Fully sent: the backing file is gone and the path is released
    assert_eq!(fs_err::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(registry.live_jobs(), 0);
}

#[tokio::test]
async fn test_body_format_field_selects_audio() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), Arc::new(StubExtractor)));

    let response = app
        .oneshot(post_json(
            "/download",
            r#"{"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=30", "format": "audio"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("audio.mp3"));
}

#[tokio::test]
async fn test_music_segment_is_audio_alias() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), Arc::new(StubExtractor)));

    let response = app
        .oneshot(post_json(
            "/download/music",
            r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
}

#[tokio::test]
async fn test_extraction_failure_returns_500_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(RefusingExtractor));
    let registry = Arc::clone(&state.registry);
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/download/video",
            r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_message(response).await,
        "this content is private or unavailable"
    );
    assert_eq!(fs_err::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(registry.live_jobs(), 0);
}
