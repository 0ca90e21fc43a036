use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::extract::{ExtractError, MediaExtractor, MediaKind};
use crate::extract::ytdlp::cleanup_partial;
use crate::normalize::{normalize, MediaId, ValidationError};

/// A client's request: the raw link plus the kind of media wanted.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub kind: MediaKind,
}

/// Lifecycle of one server-side job. Transitions are strictly sequential;
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Extracting,
    Ready,
    Streaming,
    Done,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Extracting => "extracting",
            JobStatus::Ready => "ready",
            JobStatus::Streaming => "streaming",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Extraction(#[from] ExtractError),
}

/// One unit of work covering validation-through-cleanup for a single
/// request. Owns its output path via the cleanup guard: dropping a job in
/// any state removes the backing file (if present) and frees the path for
/// reuse.
pub struct Job {
    pub id: String,
    pub media_id: MediaId,
    pub kind: MediaKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    guard: CleanupGuard,
}

impl Job {
    pub fn output_path(&self) -> &Path {
        &self.guard.path
    }

    /// Move to the next state. Callers only ever advance forward; the
    /// transition is logged for traceability.
    pub fn advance(&mut self, next: JobStatus) {
        tracing::debug!("Job {}: {} -> {}", self.id, self.status, next);
        self.status = next;
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("media_id", &self.media_id)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("output_path", &self.guard.path)
            .finish()
    }
}

/// Removes the backing file and releases the output-path reservation when
/// dropped. Held by the job for its whole lifetime, so cleanup runs exactly
/// once no matter where the job dies: extraction failure, client disconnect
/// mid-stream, or a clean send.
struct CleanupGuard {
    path: PathBuf,
    registry: Arc<JobRegistry>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        cleanup_partial(&self.path);
        self.registry.release(&self.path);
    }
}

/// Owns the download directory and the set of in-flight output paths. The
/// path set is the only shared mutable state between concurrent jobs.
pub struct JobRegistry {
    output_dir: PathBuf,
    live: Mutex<HashSet<PathBuf>>,
}

impl JobRegistry {
    /// Create the registry, the download directory (if absent) and sweep
    /// files orphaned by a previous run.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs_err::create_dir_all(&output_dir)
            .context("Failed to create download directory")?;

        let swept = sweep_orphans(&output_dir);
        if swept > 0 {
            tracing::info!("Swept {} orphaned file(s) from {}", swept, output_dir.display());
        }

        Ok(Self {
            output_dir,
            live: Mutex::new(HashSet::new()),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of jobs currently holding an output path.
    pub fn live_jobs(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Run one request through its full server-side lifecycle: validate,
    /// allocate a unique output path, invoke the extractor, and return the
    /// job ready for streaming. Validation failures short-circuit before
    /// any allocation or external invocation.
    pub async fn dispatch(
        self: Arc<Self>,
        extractor: &dyn MediaExtractor,
        request: &DownloadRequest,
    ) -> Result<Job, DispatchError> {
        let media_id = normalize(&request.url)?;

        let mut job = self.allocate(media_id, request.kind);
        tracing::info!(
            "Job {}: fetching {} ({}) -> {}",
            job.id,
            job.media_id,
            job.kind,
            job.output_path().display()
        );

        job.advance(JobStatus::Extracting);
        match extractor.extract(&job.media_id, job.kind, job.output_path()).await {
            Ok(()) => {
                job.advance(JobStatus::Ready);
                Ok(job)
            }
            Err(e) => {
                job.advance(JobStatus::Failed);
                // Dropping the job removes any partial file and frees the path.
                Err(e.into())
            }
        }
    }

    /// Allocate a fresh job with a collision-free output path. The token is
    /// random and never derived from user input; uniqueness is proven
    /// against the live-path set (and the filesystem, in case of leftovers).
    fn allocate(self: Arc<Self>, media_id: MediaId, kind: MediaKind) -> Job {
        let created_at = Utc::now();
        let timestamp = created_at.format("%Y%m%d_%H%M%S");

        let mut live = self.live.lock().unwrap();
        let (token, path) = loop {
            let token = Uuid::new_v4().to_string()[..8].to_string();
            let name = format!("{}_{}_{}.{}", kind.as_str(), timestamp, token, kind.file_extension());
            let path = self.output_dir.join(name);
            if !live.contains(&path) && !path.exists() {
                live.insert(path.clone());
                break (token, path);
            }
        };
        drop(live);

        Job {
            id: format!("job_{}_{}", timestamp, token),
            media_id,
            kind,
            status: JobStatus::Pending,
            created_at,
            guard: CleanupGuard {
                path,
                registry: self,
            },
        }
    }

    fn release(&self, path: &Path) {
        self.live.lock().unwrap().remove(path);
    }
}

/// Delete regular files left behind by a previous run. Conservative: only
/// direct children, never directories. Failures are logged, not fatal.
fn sweep_orphans(dir: &Path) -> usize {
    let entries = match fs_err::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not scan {} for orphans: {}", dir.display(), e);
            return 0;
        }
    };

    let mut swept = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            match fs_err::remove_file(&path) {
                Ok(()) => swept += 1,
                Err(e) => tracing::warn!("Could not remove orphan {}: {}", path.display(), e),
            }
        }
    }
    swept
}
