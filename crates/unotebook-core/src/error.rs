//! Error types for unotebook-core.

use thiserror::Error;

/// Result type for unotebook-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in unotebook-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Notebook name does not carry the reserved document suffix.
    #[error("invalid notebook name: {0}")]
    InvalidName(String),

    /// Cell source failed to parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// Cell source raised while running.
    #[error("execution error: {0}")]
    Execution(String),

    /// The output channel to the client failed.
    #[error("channel error: {0}")]
    Channel(#[source] std::io::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
