use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::extract::MediaKind;

#[derive(Parser)]
#[command(
    name = "tubefetch",
    about = "Tubefetch - Fetch video or audio from YouTube links via yt-dlp",
    version,
    long_about = "A self-hostable download service plus a command-line client. The serve command runs the HTTP backend that validates links, drives yt-dlp and streams the result; the fetch command talks to a running backend and saves the file locally with live progress."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP download service
    Serve {
        /// Listen port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for in-flight download files (overrides the config file)
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// Fetch one video or audio file through a running service
    Fetch {
        /// YouTube link (watch, share, embed or shorts URL)
        #[arg(value_name = "URL")]
        url: String,

        /// Media kind to request
        #[arg(short, long, value_enum, default_value = "video")]
        kind: FetchKind,

        /// Output file path (derived from the media kind if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Base URL of the service
        #[arg(short, long, default_value = "http://localhost:5000")]
        server: String,

        /// Overall request timeout in seconds
        #[arg(short, long, default_value = "60")]
        timeout: u64,
    },

    /// Configure the service
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FetchKind {
    /// Combined audio+video file
    Video,
    /// Audio-only file
    Audio,
}

impl From<FetchKind> for MediaKind {
    fn from(kind: FetchKind) -> Self {
        match kind {
            FetchKind::Video => MediaKind::Video,
            FetchKind::Audio => MediaKind::Audio,
        }
    }
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchKind::Video => write!(f, "video"),
            FetchKind::Audio => write!(f, "audio"),
        }
    }
}
