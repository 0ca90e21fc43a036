use std::fmt;

use url::Url;

/// Canonical identifier for a single media item, independent of which
/// supported link shape was used to express it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaId(String);

impl MediaId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch-page URL for this identifier. The extractor is always
    /// invoked with this form, never with the raw user-supplied link.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors produced by syntactic URL validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("not a valid absolute URL: {0}")]
    MalformedUrl(String),

    #[error("not a recognized YouTube link; expected a watch, share, embed or shorts URL")]
    UnsupportedLinkShape,
}

/// Validate a user-supplied link and extract the canonical media identifier.
///
/// Recognized shapes:
/// - `youtu.be/<id>` short links (identifier truncated at `?`, `&` or `/`)
/// - `*.youtube.com/watch?v=<id>` watch pages (other query params ignored)
/// - `*.youtube.com/{embed,v,shorts}/<id>` path variants
///
/// Purely syntactic: no I/O, no network resolution.
pub fn normalize(raw: &str) -> Result<MediaId, ValidationError> {
    let parsed = Url::parse(raw).map_err(|_| ValidationError::MalformedUrl(raw.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::UnsupportedLinkShape);
    }

    let host = parsed
        .host_str()
        .ok_or(ValidationError::UnsupportedLinkShape)?
        .to_lowercase();

    let id = if host == "youtu.be" {
        short_link_id(&parsed)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        watch_param(&parsed).or_else(|| path_variant_id(&parsed))
    } else {
        None
    };

    match id {
        Some(id) if !id.is_empty() => Ok(MediaId(id)),
        _ => Err(ValidationError::UnsupportedLinkShape),
    }
}

/// `youtu.be/<id>`: the first path segment, cut at `?`, `&` or `/`.
fn short_link_id(url: &Url) -> Option<String> {
    let path = url.path().trim_start_matches('/');
    let id = path.split(['?', '&', '/']).next().unwrap_or("");
    (!id.is_empty()).then(|| id.to_string())
}

/// `watch?v=<id>`: the `v` query parameter.
fn watch_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// `/embed/<id>`, `/v/<id>`, `/shorts/<id>`.
fn path_variant_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    let head = segments.next()?;
    if !matches!(head, "embed" | "v" | "shorts") {
        return None;
    }
    let id = segments.next()?.split('&').next().unwrap_or("");
    (!id.is_empty()).then(|| id.to_string())
}
