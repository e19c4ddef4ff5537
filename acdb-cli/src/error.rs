//! CLI error type.

use std::path::PathBuf;

use acdb::AcdbError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Acdb(#[from] AcdbError),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            CliError::Config(_) | CliError::Acdb(AcdbError::Config(_)) => 3,
            CliError::Acdb(AcdbError::UnhandledResponseKind(_)) => 4,
            _ => 1,
        }
    }
}
