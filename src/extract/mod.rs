use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::normalize::MediaId;

pub mod ytdlp;

pub use ytdlp::YtDlpExtractor;

/// Media kind requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Combined audio+video container.
    Video,
    /// Audio-only, transcoded to a fixed container format. `music` is the
    /// spelling the first-generation web client sends.
    #[serde(alias = "music")]
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// File extension used for output naming and the client-facing
    /// filename hint.
    pub fn file_extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    /// MIME type for the response body.
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }

    /// Parse a route path segment. Accepts `music` as an alias for `audio`.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "video" => Some(MediaKind::Video),
            "audio" | "music" => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extraction failures, classified so that the message shown to a client is
/// always human-readable and never the collaborator's raw diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("the extractor could not reach the source site")]
    SourceUnreachable,

    #[error("this content is private or unavailable")]
    ContentUnavailable,

    #[error("the source site rejected the video identifier")]
    InvalidIdentifier,

    #[error("could not write the output file")]
    DestinationUnwritable,

    #[error("yt-dlp is not available; install it from https://github.com/yt-dlp/yt-dlp")]
    ToolMissing,

    #[error("media extraction failed")]
    Failed,
}

/// Contract with the external extraction collaborator: given an identifier
/// and a kind, produce exactly one file at `dest` or fail leaving nothing
/// behind.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn extract(&self, id: &MediaId, kind: MediaKind, dest: &Path) -> Result<(), ExtractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_segment() {
        assert_eq!(MediaKind::from_segment("video"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_segment("audio"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_segment("music"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_segment("gif"), None);
    }

    #[test]
    fn test_kind_from_json() {
        assert_eq!(
            serde_json::from_str::<MediaKind>("\"video\"").unwrap(),
            MediaKind::Video
        );
        assert_eq!(
            serde_json::from_str::<MediaKind>("\"audio\"").unwrap(),
            MediaKind::Audio
        );
        assert_eq!(
            serde_json::from_str::<MediaKind>("\"music\"").unwrap(),
            MediaKind::Audio
        );
        assert!(serde_json::from_str::<MediaKind>("\"flac\"").is_err());
    }

    #[test]
    fn test_kind_naming() {
        assert_eq!(MediaKind::Video.file_extension(), "mp4");
        assert_eq!(MediaKind::Audio.file_extension(), "mp3");
        assert_eq!(MediaKind::Video.mime_type(), "video/mp4");
        assert_eq!(MediaKind::Audio.mime_type(), "audio/mpeg");
    }
}
