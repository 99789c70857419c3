//! Error types for Tubeloop core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Tubeloop core operations.
///
/// None of these are fatal. Storage failures are absorbed where they occur;
/// the rest are reported to the user without changing the playlist beyond what
/// already succeeded.
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be parsed as a video URL or identifier.
    #[error("Invalid video URL or ID: {0}")]
    InvalidInput(String),

    /// The video is already in the playlist.
    #[error("Video is already in the playlist: {0}")]
    DuplicateEntry(String),

    /// The durable key-value store could not be read or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The clipboard could not be accessed.
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    /// The embedded player API is not loaded yet.
    #[error("Player is not ready yet, try again shortly")]
    PlayerNotReady,

    /// Playback rate outside the supported range.
    #[error("Playback rate {0} is outside the supported range 0.5-2.0")]
    InvalidPlaybackRate(f64),

    /// Unknown play mode tag.
    #[error("Unknown play mode: {0}")]
    InvalidPlayMode(String),

    /// File system operation failed.
    #[error("File system error at {path}: {message}")]
    FileSystem {
        /// Path where the error occurred.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the user can simply retry the operation later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PlayerNotReady | Self::ClipboardUnavailable(_) | Self::StorageUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("not a url".to_string());
        assert_eq!(err.to_string(), "Invalid video URL or ID: not a url");
    }

    #[test]
    fn test_duplicate_entry_display() {
        let err = Error::DuplicateEntry("dQw4w9WgXcQ".to_string());
        assert_eq!(
            err.to_string(),
            "Video is already in the playlist: dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_file_system_error_display() {
        let err = Error::FileSystem {
            path: PathBuf::from("/test/path"),
            message: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/test/path"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::PlayerNotReady.is_retryable());
        assert!(Error::ClipboardUnavailable("denied".to_string()).is_retryable());
        assert!(!Error::InvalidPlaybackRate(3.0).is_retryable());
        assert!(!Error::InvalidInput(String::new()).is_retryable());
    }
}
