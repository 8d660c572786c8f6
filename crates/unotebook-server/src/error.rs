//! Error types for the unotebook server.

use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// unotebook core error.
    #[error("Core error: {0}")]
    Core(#[from] unotebook_core::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Route or stored file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body without a Content-Length header.
    #[error("Missing Content-Length header")]
    MissingContentLength,
}

impl ServerError {
    /// Wrap an IO error on `path`, keeping not-found distinct.
    pub fn io(path: impl Into<PathBuf>, e: io::Error) -> Self {
        let path = path.into();
        if e.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.display().to_string())
        } else {
            Self::Io {
                path,
                message: e.to_string(),
            }
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        Self::io(PathBuf::new(), e)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::NotFound(what) => {
                tracing::debug!("Not found: {}", what);
                StatusCode::NOT_FOUND.into_response()
            }
            e => {
                tracing::error!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
            }
        }
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
