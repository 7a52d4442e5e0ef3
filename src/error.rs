//! Error types for each layer of the gallery.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Configuration errors raised while reading the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is present but cannot be used.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Object store failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// The storage service answered with a non-success status.
    #[error("storage service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("storage authentication failed: {0}")]
    Auth(String),

    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object {key} is not valid UTF-8")]
    NotText { key: String },
}

/// Failures while asking the generative API for a description.
#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("generative API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generative API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generative API reply contained no text")]
    EmptyReply,

    #[error("reply is not a title/description object: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not read scratch file: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by the read routes.
///
/// Always rendered as a bare 500; details only go to the log.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
