//! Error types for audiovis core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for visualization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Visualization error types
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("Source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    // Transcoder errors
    #[error("Transcoder unavailable ({program}): {source}")]
    TranscoderUnavailable {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    // Cache errors
    #[error("Failed to write cache entry {}: {source}", path.display())]
    CacheWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode placeholder image: {0}")]
    Placeholder(String),

    // Engine errors
    #[error("Transform engine is shut down")]
    EngineClosed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an IO error raised while publishing a cache entry
    pub fn cache_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::CacheWrite {
            path: path.into(),
            source,
        }
    }

    /// Returns true if retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::TranscoderUnavailable { .. } | Error::CacheWrite { .. } | Error::Io(_)
        )
    }

    /// Returns a stable error code for callers that report failures
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::SourceNotFound { .. } => "SOURCE_NOT_FOUND",
            Error::TranscoderUnavailable { .. } => "TRANSCODER_UNAVAILABLE",
            Error::Decode(_) => "DECODE",
            Error::CacheWrite { .. } => "CACHE_WRITE",
            Error::Placeholder(_) => "PLACEHOLDER",
            Error::EngineClosed => "ENGINE_CLOSED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_not_found_is_distinct() {
        let err = Error::SourceNotFound {
            path: PathBuf::from("/music/missing.mp3"),
        };
        assert_eq!(err.error_code(), "SOURCE_NOT_FOUND");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("/music/missing.mp3"));
    }

    #[test]
    fn test_cache_write_is_recoverable() {
        let err = Error::cache_write(
            "/cache/waveforms/a.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.error_code(), "CACHE_WRITE");
        assert!(err.is_recoverable());
    }
}
