use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ExtractError, MediaExtractor, MediaKind};
use crate::config::ExtractorConfig;
use crate::normalize::MediaId;

/// Media extractor backed by the external yt-dlp program.
pub struct YtDlpExtractor {
    yt_dlp_path: String,
    audio_format: String,
}

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            audio_format: "mp3".to_string(),
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            audio_format: config.audio_format.clone(),
        }
    }

    /// Argument list for one invocation. `--no-playlist` always: one
    /// identifier maps to one file.
    fn build_args(&self, id: &MediaId, kind: MediaKind, dest: &Path) -> Vec<String> {
        let mut args = match kind {
            MediaKind::Video => vec!["--format".to_string(), "mp4".to_string()],
            MediaKind::Audio => vec![
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                self.audio_format.clone(),
            ],
        };
        args.push("--no-playlist".to_string());
        args.push("--output".to_string());
        args.push(dest.to_string_lossy().into_owned());
        args.push(id.watch_url());
        args
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(&self, id: &MediaId, kind: MediaKind, dest: &Path) -> Result<(), ExtractError> {
        tracing::debug!("Running yt-dlp for {} ({})", id, kind);

        // kill_on_drop: if the request future is dropped (client gone,
        // request timed out) the child must not keep running unobserved.
        let output = Command::new(&self.yt_dlp_path)
            .args(self.build_args(id, kind, dest))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::error!("yt-dlp binary not found at '{}'", self.yt_dlp_path);
                return Err(ExtractError::ToolMissing);
            }
            Err(e) => {
                tracing::error!("Failed to spawn yt-dlp: {}", e);
                return Err(ExtractError::Failed);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                "yt-dlp failed for {} (status {}): {}",
                id,
                output.status,
                stderr.trim()
            );
            cleanup_partial(dest);
            return Err(classify_stderr(&stderr));
        }

        // A zero exit with no file means the collaborator broke its contract.
        if !dest.exists() {
            tracing::warn!("yt-dlp reported success but produced no file at {}", dest.display());
            return Err(ExtractError::Failed);
        }

        Ok(())
    }
}

/// Map yt-dlp's stderr to a failure class. The raw text stays in the server
/// log; only the classified message ever reaches a client.
fn classify_stderr(stderr: &str) -> ExtractError {
    let text = stderr.to_lowercase();

    if text.contains("private video")
        || text.contains("video unavailable")
        || text.contains("this video is not available")
        || text.contains("content isn't available")
        || text.contains("removed")
        || text.contains("sign in to confirm your age")
        || text.contains("blocked")
    {
        return ExtractError::ContentUnavailable;
    }

    if text.contains("incomplete youtube id")
        || text.contains("is not a valid url")
        || text.contains("unsupported url")
        || text.contains("truncated")
    {
        return ExtractError::InvalidIdentifier;
    }

    if text.contains("unable to open for writing")
        || text.contains("permission denied")
        || text.contains("no space left")
        || text.contains("read-only file system")
    {
        return ExtractError::DestinationUnwritable;
    }

    if text.contains("unable to download")
        || text.contains("connection")
        || text.contains("network")
        || text.contains("timed out")
        || text.contains("temporary failure in name resolution")
        || text.contains("getaddrinfo")
    {
        return ExtractError::SourceUnreachable;
    }

    ExtractError::Failed
}

/// Remove whatever a failed or aborted invocation left at `dest`, including
/// yt-dlp's intermediate `.part`/`.ytdl` files. Missing files are fine;
/// other removal failures are logged and swallowed.
pub(crate) fn cleanup_partial(dest: &Path) {
    let mut candidates = vec![dest.to_path_buf()];
    for suffix in [".part", ".ytdl"] {
        let mut name = dest.as_os_str().to_owned();
        name.push(suffix);
        candidates.push(PathBuf::from(name));
    }

    for path in candidates {
        match fs_err::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed partial file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove partial file {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn test_video_args() {
        let extractor = YtDlpExtractor::new();
        let id = normalize("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let args = extractor.build_args(&id, MediaKind::Video, Path::new("/tmp/out.mp4"));

        assert_eq!(args[0], "--format");
        assert_eq!(args[1], "mp4");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_audio_args() {
        let extractor = YtDlpExtractor::new();
        let id = normalize("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let args = extractor.build_args(&id, MediaKind::Audio, Path::new("/tmp/out.mp3"));

        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"--audio-format".to_string()));
        assert!(args.contains(&"mp3".to_string()));
        assert!(!args.contains(&"--format".to_string()));
    }

    #[test]
    fn test_classify_stderr() {
        assert_eq!(
            classify_stderr("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            ExtractError::ContentUnavailable
        );
        assert_eq!(
            classify_stderr("ERROR: [youtube] abc: Video unavailable"),
            ExtractError::ContentUnavailable
        );
        assert_eq!(
            classify_stderr("ERROR: Incomplete YouTube ID abc"),
            ExtractError::InvalidIdentifier
        );
        assert_eq!(
            classify_stderr("ERROR: unable to download video data: HTTP Error 403"),
            ExtractError::SourceUnreachable
        );
        assert_eq!(
            classify_stderr("ERROR: unable to open for writing: /out/video.mp4"),
            ExtractError::DestinationUnwritable
        );
        assert_eq!(classify_stderr("something entirely new"), ExtractError::Failed);
    }

    #[test]
    fn test_cleanup_partial_removes_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video_x.mp4");
        fs_err::write(&dest, b"partial").unwrap();
        fs_err::write(dir.path().join("video_x.mp4.part"), b"partial").unwrap();

        cleanup_partial(&dest);

        assert!(!dest.exists());
        assert!(!dir.path().join("video_x.mp4.part").exists());
        // Idempotent on a second call
        cleanup_partial(&dest);
    }
}
