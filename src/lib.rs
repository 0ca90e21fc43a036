//! Tubefetch - A self-hostable service for fetching video or audio from YouTube links
//!
//! This library provides the full pipeline: syntactic URL validation, job
//! dispatch against the external yt-dlp extractor, streaming delivery of the
//! finished file over HTTP, and a command-line client that tracks transfer
//! progress chunk by chunk.

pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod normalize;
pub mod server;
pub mod utils;

pub use cli::{Cli, Commands, FetchKind};
pub use config::Config;
pub use dispatch::{DownloadRequest, Job, JobRegistry, JobStatus};
pub use extract::{ExtractError, MediaExtractor, MediaKind, YtDlpExtractor};
pub use normalize::{normalize, MediaId, ValidationError};
pub use server::{build_router, start_server, AppState};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
