//! Error types for the HTTP server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use liveserve_core::{PathEscapeError, PatternError};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Nothing is served at the requested path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request path climbs above the served root.
    #[error(transparent)]
    PathEscape(#[from] PathEscapeError),

    /// Served root is missing or not a directory.
    #[error("Root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Ignore pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// File watcher failed.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status for this error when it ends a request.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::PathEscape(_) => StatusCode::NOT_FOUND,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error")
        );
        (status, body).into_response()
    }
}
