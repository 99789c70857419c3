//! Embedded player capability.
//!
//! The player widget itself lives outside this crate. A host provides a
//! [`PlayerFactory`] that builds [`PlayerHandle`]s and forwards the widget's
//! callbacks to the coordinator as [`PlayerEvent`]s.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::youtube::VideoId;

/// Slowest supported playback rate.
pub const MIN_PLAYBACK_RATE: f64 = 0.5;
/// Fastest supported playback rate.
pub const MAX_PLAYBACK_RATE: f64 = 2.0;
/// Rate used when nothing valid is stored.
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

/// Check that `rate` is inside the supported range.
///
/// # Errors
///
/// Returns [`Error::InvalidPlaybackRate`] for values outside `[0.5, 2.0]` or NaN.
pub fn validate_playback_rate(rate: f64) -> Result<f64> {
    if (MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
        Ok(rate)
    } else {
        Err(Error::InvalidPlaybackRate(rate))
    }
}

/// Settings the player is constructed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Element the widget mounts into.
    pub container: String,
    /// Video loaded at construction.
    pub initial_video_id: VideoId,
    /// Start playing as soon as the video is loaded.
    pub autoplay: bool,
    /// Width, as a CSS length.
    pub width: String,
    /// Height, as a CSS length.
    pub height: String,
}

/// Control surface of a constructed player.
#[cfg_attr(test, mockall::automock)]
pub trait PlayerHandle: Send {
    /// Load a video and start playing it.
    fn load_by_id(&mut self, id: &VideoId);

    /// Resume or start playback of the loaded video.
    fn play(&mut self);

    /// Stop playback.
    fn stop(&mut self);

    /// Set the playback rate.
    fn set_rate(&mut self, rate: f64);

    /// Duration of the loaded video in seconds, if known.
    fn duration(&self) -> Option<f64>;
}

/// Builds players on demand.
#[cfg_attr(test, mockall::automock)]
pub trait PlayerFactory: Send {
    /// Construct a player.
    ///
    /// Fails with [`Error::PlayerNotReady`] while the widget API is still loading.
    fn create(&mut self, config: PlayerConfig) -> Result<Box<dyn PlayerHandle>>;
}

/// Player lifecycle state as reported by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// No video started yet.
    Unstarted,
    /// The video played to the end.
    Ended,
    /// Playing.
    Playing,
    /// Paused.
    Paused,
    /// Buffering.
    Buffering,
    /// Video cued and ready to play.
    Cued,
    /// Anything else.
    Other,
}

impl PlayerState {
    /// Decode the widget's numeric state.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::Unstarted,
            0 => Self::Ended,
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Buffering,
            5 => Self::Cued,
            _ => Self::Other,
        }
    }

    /// Parse a state name (`ended`, `playing`, ...) or numeric code.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(code) = s.parse::<i32>() {
            return Self::from_code(code);
        }
        match s.to_ascii_lowercase().as_str() {
            "unstarted" => Self::Unstarted,
            "ended" => Self::Ended,
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            "buffering" => Self::Buffering,
            "cued" => Self::Cued,
            _ => Self::Other,
        }
    }
}

/// Error reported by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerErrorCode {
    /// Malformed request (code 2).
    InvalidParameter,
    /// HTML5 player failure (code 5).
    Html5,
    /// Video removed or private (code 100).
    NotFound,
    /// Owner disallows embedded playback (codes 101 and 150).
    EmbedNotAllowed(i32),
    /// Unrecognized code.
    Unknown(i32),
}

impl PlayerErrorCode {
    /// Decode the widget's numeric error.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            2 => Self::InvalidParameter,
            5 => Self::Html5,
            100 => Self::NotFound,
            101 | 150 => Self::EmbedNotAllowed(code),
            other => Self::Unknown(other),
        }
    }

    /// Whether the video can only be watched on the provider's own site.
    #[must_use]
    pub const fn is_embed_restricted(self) -> bool {
        matches!(self, Self::EmbedNotAllowed(_))
    }
}

/// Callback from the widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// The widget finished initializing.
    Ready,
    /// Playback failed.
    Error(PlayerErrorCode),
    /// Lifecycle state changed.
    StateChanged(PlayerState),
}
