//! Client side of the pipeline: submit a link, consume the streamed
//! response incrementally, and keep the user informed through a small
//! state machine with live percentage progress.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::extract::MediaKind;
use crate::normalize::{normalize, ValidationError};

/// UI state machine for one download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Preparing,
    Downloading,
    Complete,
    Error,
}

/// Byte accounting for an in-flight transfer, recomputed per chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferProgress {
    pub bytes_received: u64,
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Completion percentage, clamped to [0, 100]. `None` while the
    /// declared length is unknown.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total_bytes.filter(|t| *t > 0)?;
        Some((self.bytes_received.saturating_mul(100) / total).min(100) as u8)
    }
}

/// Tracks which phase a download attempt is in. Transitions are strictly
/// sequential; `Complete` and `Error` are terminal.
#[derive(Debug)]
pub struct ProgressTracker {
    phase: Phase,
    progress: TransferProgress,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            progress: TransferProgress::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> TransferProgress {
        self.progress
    }

    fn advance(&mut self, next: Phase) {
        tracing::debug!("Fetch phase: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    pub fn begin_validation(&mut self) {
        self.advance(Phase::Validating);
    }

    pub fn begin_request(&mut self) {
        self.advance(Phase::Preparing);
    }

    /// Response headers arrived; the declared length (if any) is fixed for
    /// the rest of the transfer.
    pub fn begin_transfer(&mut self, total_bytes: Option<u64>) {
        self.progress.total_bytes = total_bytes;
        self.advance(Phase::Downloading);
    }

    /// Record one received chunk and return the updated percentage.
    pub fn on_chunk(&mut self, len: usize) -> Option<u8> {
        self.progress.bytes_received += len as u64;
        self.progress.percent()
    }

    pub fn complete(&mut self) {
        self.advance(Phase::Complete);
    }

    pub fn fail(&mut self) {
        self.advance(Phase::Error);
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure modes a user can tell apart: local validation, server
/// rejection, transport failure, timeout, and local file I/O.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("server rejected the request: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0}s")]
    TimedOut(u64),

    #[error("could not save the downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FetchOptions {
    /// Base URL of a running tubefetch service
    pub server: String,

    /// Destination path; derived from the media kind if not given
    pub output: Option<PathBuf>,

    /// Overall bound on the whole request, submission to last byte
    pub timeout: Duration,

    /// Suppress progress output
    pub quiet: bool,
}

/// A finished download: where it landed and how many bytes arrived.
pub struct Fetched {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Structured error body the server sends on failure.
#[derive(Debug, Deserialize)]
struct ServerErrorBody {
    error: String,
}

/// Run one download attempt end to end. A single timeout governs the whole
/// request; exceeding it yields `TimedOut`, distinct from network and
/// server failures.
pub async fn fetch(url: &str, kind: MediaKind, opts: &FetchOptions) -> Result<Fetched, FetchError> {
    let mut tracker = ProgressTracker::new();
    let bar = if opts.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    };

    let limit = opts.timeout;
    let result = with_timeout(limit, run(&mut tracker, &bar, url, kind, opts)).await;

    if result.is_err() {
        tracker.fail();
        bar.abandon();
    }
    result
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::TimedOut(limit.as_secs())),
    }
}

async fn run(
    tracker: &mut ProgressTracker,
    bar: &ProgressBar,
    url: &str,
    kind: MediaKind,
    opts: &FetchOptions,
) -> Result<Fetched, FetchError> {
    tracker.begin_validation();
    bar.set_message("Validating link...");

    // Mirror of the server-side gate: obviously bad input never reaches
    // the network.
    let media_id = normalize(url)?;

    tracker.begin_request();
    bar.set_message(format!("Waiting for the server to prepare {} ({})...", media_id, kind));

    let endpoint = format!("{}/download/{}", opts.server.trim_end_matches('/'), kind);
    let response = reqwest::Client::new()
        .post(&endpoint)
        .json(&json!({ "url": url }))
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let message = match response.json::<ServerErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        return Err(FetchError::Rejected(message));
    }

    let total = response.content_length();
    let hint = filename_hint(response.headers());

    tracker.begin_transfer(total);
    match total {
        Some(total) => {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                    .unwrap(),
            );
            bar.set_length(total);
            bar.set_position(0);
            bar.set_message("Downloading...");
        }
        None => {
            // No declared length: keep the spinner, show text only
            bar.set_message("Downloading (size unknown)...");
        }
    }

    let output_path = opts.output.clone().unwrap_or_else(|| {
        PathBuf::from(hint.unwrap_or_else(|| format!("{}.{}", kind.as_str(), kind.file_extension())))
    });
    let parent = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    // Assemble into a temp file next to the destination; only a cleanly
    // finished stream is persisted under the final name.
    let mut temp = NamedTempFile::new_in(parent)?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Network(e.to_string()))?;
        temp.write_all(&chunk)?;
        tracker.on_chunk(chunk.len());
        bar.set_position(tracker.progress().bytes_received);
    }
    temp.flush()?;

    let bytes = tracker.progress().bytes_received;
    temp.persist(&output_path).map_err(|e| FetchError::Io(e.error))?;

    tracker.complete();
    bar.finish_with_message("Download complete");

    Ok(Fetched {
        path: output_path,
        bytes,
    })
}

/// Filename hint from a Content-Disposition header, if it carries a sane
/// quoted filename.
fn filename_hint(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    let start = value.find("filename=\"")? + "filename=\"".len();
    let rest = &value[start..];
    let name = &rest[..rest.find('"')?];
    (!name.is_empty() && !name.contains('/') && !name.contains('\\')).then(|| name.to_string())
}
