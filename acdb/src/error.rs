//! Error types for the ACDB library.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for ACDB operations.
pub type AcdbResult<T> = Result<T, AcdbError>;

/// Errors that can occur while storing, synchronizing or querying tile data.
#[derive(Debug, Error)]
pub enum AcdbError {
    /// Tile coordinate outside the 16×16 grid.
    #[error("invalid tile coordinate ({tile_x}, {tile_y}): both axes must be in 0..=15")]
    InvalidTileCoordinate { tile_x: i32, tile_y: i32 },

    /// A tile bundle could not be read, decoded or validated.
    #[error("failed to install {}: {reason}", path.display())]
    InstallFailure { path: PathBuf, reason: String },

    /// A response body is not valid JSON or lacks required fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Marker id not present in the store.
    #[error("unknown marker {0}")]
    UnknownMarker(u64),

    /// Review id not present in the store.
    #[error("unknown review {0}")]
    UnknownReview(u64),

    /// Web view result type the engine does not apply.
    #[error("unhandled web view response kind '{0}'")]
    UnhandledResponseKind(String),

    /// Bounding box with zero or negative extent.
    #[error("invalid bounding box (south {south}, west {west}, north {north}, east {east})")]
    InvalidBoundingBox {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },

    /// URL does not match any known acdb:// shape.
    #[error("unrecognized URL: {0}")]
    UnrecognizedUrl(String),

    /// Persistence back end failed.
    #[error("storage error at {}: {source}", path.display())]
    Storage { path: PathBuf, source: io::Error },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AcdbError {
    /// Whether a caller processing a batch may continue after this error.
    ///
    /// Only unhandled web view kinds are non-fatal: the store is untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnhandledResponseKind(_))
    }

    pub(crate) fn install(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InstallFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tile_display() {
        let err = AcdbError::InvalidTileCoordinate {
            tile_x: 16,
            tile_y: -1,
        };
        assert!(err.to_string().contains("(16, -1)"));
    }

    #[test]
    fn test_install_failure_display() {
        let err = AcdbError::install("/tmp/tile.json", "missing version");
        assert_eq!(
            err.to_string(),
            "failed to install /tmp/tile.json: missing version"
        );
    }

    #[test]
    fn test_only_unhandled_kind_is_recoverable() {
        assert!(AcdbError::UnhandledResponseKind("ERROR".into()).is_recoverable());
        assert!(!AcdbError::UnknownMarker(7).is_recoverable());
        assert!(!AcdbError::MalformedResponse("x".into()).is_recoverable());
    }
}
