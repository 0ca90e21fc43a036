//! HTTP surface of the download pipeline.
//!
//! One route family does the real work: `POST /download` (kind in the JSON
//! body) and `POST /download/{kind}` (kind as a path segment, the shape the
//! web frontends use). Everything else is liveness plumbing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod stream;

pub use error::{ApiError, ApiResult};

use crate::config::Config;
use crate::dispatch::{DownloadRequest, JobRegistry};
use crate::extract::{MediaExtractor, MediaKind, YtDlpExtractor};

/// Shared application state, explicitly constructed and passed down so the
/// pipeline stays testable without global mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<JobRegistry>,
    pub extractor: Arc<dyn MediaExtractor>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let registry = Arc::new(
            JobRegistry::new(&config.storage.download_dir)
                .context("Failed to initialize job registry")?,
        );
        let extractor: Arc<dyn MediaExtractor> =
            Arc::new(YtDlpExtractor::from_config(&config.extractor));

        Ok(Self {
            config: Arc::new(config),
            registry,
            extractor,
        })
    }
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.server.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(landing))
        .route("/health", get(health))
        .route("/download", post(download))
        .route("/download/{kind}", post(download_with_kind))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.timeout_secs,
        )))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server. Blocks until SIGTERM or Ctrl+C.
pub async fn start_server(config: Config) -> Result<()> {
    let addr = config.server.socket_addr()?;
    let state = AppState::new(config)?;

    tracing::info!(
        "Listening on {}, downloads in {}",
        addr,
        state.registry.output_dir().display()
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listen address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn landing() -> &'static str {
    "tubefetch backend is running"
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "live_jobs": state.registry.live_jobs(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    url: Option<String>,
    format: Option<MediaKind>,
}

async fn download(
    State(state): State<AppState>,
    Json(body): Json<DownloadBody>,
) -> ApiResult<Response> {
    let kind = body.format.unwrap_or(MediaKind::Video);
    run_download(state, body.url, kind).await
}

async fn download_with_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<DownloadBody>,
) -> ApiResult<Response> {
    let kind = MediaKind::from_segment(&kind)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown media kind: {kind}")))?;
    run_download(state, body.url, kind).await
}

async fn run_download(
    state: AppState,
    url: Option<String>,
    kind: MediaKind,
) -> ApiResult<Response> {
    let url = url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL is required".to_string()))?;

    let request = DownloadRequest { url, kind };
    let job = Arc::clone(&state.registry)
        .dispatch(state.extractor.as_ref(), &request)
        .await?;

    stream::stream_job(job).await
}

/// Graceful shutdown on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
