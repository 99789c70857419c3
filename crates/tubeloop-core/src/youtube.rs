//! `YouTube` link handling.
//!
//! Extracts canonical video identifiers from pasted text and builds the links
//! the playlist needs (watch page, thumbnail, multi-video "watch_videos" page).
//!
//! ## Supported input
//!
//! - `https://www.youtube.com/watch?v=<id>` (extra query parameters are fine)
//! - `https://youtu.be/<id>`
//! - `https://www.youtube.com/embed/<id>`
//! - a bare 11-character identifier
//!
//! ```rust
//! use tubeloop_core::youtube::parse_video_id;
//!
//! let id = parse_video_id("https://youtu.be/dQw4w9WgXcQ?t=42").unwrap();
//! assert_eq!(id.as_str(), "dQw4w9WgXcQ");
//! assert!(parse_video_id("https://example.com").is_none());
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length of a canonical video identifier.
pub const VIDEO_ID_LEN: usize = 11;

/// Delimiter used when joining identifiers into an aggregate link.
pub const AGGREGATE_DELIMITER: char = ',';

/// URL patterns, tried in order. Each captures the identifier as group 1.
#[allow(clippy::expect_used)]
static URL_PATTERNS: LazyLock<[(VideoUrlType, Regex); 3]> = LazyLock::new(|| {
    [
        (
            VideoUrlType::Watch,
            Regex::new(r"youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})").expect("static pattern"),
        ),
        (
            VideoUrlType::Short,
            Regex::new(r"youtu\.be/([a-zA-Z0-9_-]{11})").expect("static pattern"),
        ),
        (
            VideoUrlType::Embed,
            Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})").expect("static pattern"),
        ),
    ]
});

/// A canonical 11-character `YouTube` video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Validate a bare identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless the value is exactly 11 characters
    /// of `[A-Za-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if is_video_id_token(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidInput(value))
        }
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VideoId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

/// Shape of the text an identifier was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VideoUrlType {
    /// `youtube.com/watch?v=...`
    Watch,
    /// `youtu.be/...`
    Short,
    /// `youtube.com/embed/...`
    Embed,
    /// The input was the identifier itself.
    BareId,
    /// Nothing recognizable.
    #[default]
    Invalid,
}

fn is_video_id_token(s: &str) -> bool {
    s.len() == VIDEO_ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn classify(text: &str) -> Option<(VideoUrlType, VideoId)> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    for (url_type, pattern) in URL_PATTERNS.iter() {
        if let Some(id) = pattern.captures(s).and_then(|caps| caps.get(1)) {
            return Some((*url_type, VideoId(id.as_str().to_string())));
        }
    }

    if is_video_id_token(s) {
        return Some((VideoUrlType::BareId, VideoId(s.to_string())));
    }

    None
}

/// Extract the video identifier from free-form text.
///
/// Returns `None` for empty input or when neither a URL pattern nor the
/// bare-identifier rule matches.
#[must_use]
pub fn parse_video_id(text: &str) -> Option<VideoId> {
    classify(text).map(|(_, id)| id)
}

/// Detect which input shape `text` is.
#[must_use]
pub fn detect_url_type(text: &str) -> VideoUrlType {
    classify(text).map_or(VideoUrlType::Invalid, |(url_type, _)| url_type)
}

/// Watch page for a single video.
#[must_use]
pub fn watch_url(id: &VideoId) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// Medium-quality thumbnail for a video.
#[must_use]
pub fn thumbnail_url(id: &VideoId) -> String {
    format!("https://img.youtube.com/vi/{id}/mqdefault.jpg")
}

/// Build a single link that opens all `ids` as a batch on youtube.com.
///
/// Returns `None` when `ids` is empty.
#[must_use]
pub fn aggregate_link<'a, I>(ids: I) -> Option<String>
where
    I: IntoIterator<Item = &'a VideoId>,
{
    let joined = ids
        .into_iter()
        .map(VideoId::as_str)
        .collect::<Vec<_>>()
        .join(&AGGREGATE_DELIMITER.to_string());

    if joined.is_empty() {
        None
    } else {
        Some(format!(
            "https://www.youtube.com/watch_videos?video_ids={joined}"
        ))
    }
}

/// Format a duration in seconds as `m:ss` or `h:mm:ss`.
///
/// Returns `None` for non-finite or non-positive values.
#[must_use]
pub fn format_duration(secs: f64) -> Option<String> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }

    let total_secs = secs as u64;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        Some(format!("{hours}:{minutes:02}:{seconds:02}"))
    } else {
        Some(format!("{minutes}:{seconds:02}"))
    }
}
