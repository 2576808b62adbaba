use serde::Serialize;

use crate::common::types::now_ms;

/// Every way a control operation can fail. Faults the engine recovers from
/// on its own (stuck tracks, dropped voice connections) never show up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MusicError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    OutOfRange(String),

    #[error("{0}")]
    NotFound(String),

    #[error("No active player for this server")]
    NoSession,

    #[error("No results found for `{0}`")]
    NoResults(String),

    #[error("Failed to load `{query}`: {message}")]
    Resolution { query: String, message: String },

    #[error("Nothing is playing right now")]
    NothingPlaying,

    #[error("Music is disabled for this server")]
    Disabled,

    #[error("{0}")]
    Connectivity(String),

    #[error("{what} timed out after {after_ms}ms")]
    Timeout { what: &'static str, after_ms: u64 },

    #[error("Request was cancelled by a stop")]
    Cancelled,
}

impl MusicError {
    /// HTTP status the control protocol reports for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::OutOfRange(_) | Self::NoResults(_) | Self::NothingPlaying => {
                400
            }
            Self::Disabled => 403,
            Self::NotFound(_) | Self::NoSession => 404,
            Self::Cancelled => 409,
            Self::Resolution { .. } | Self::Connectivity(_) => 502,
            Self::Timeout { .. } => 504,
        }
    }
}

/// JSON error body returned by the control protocol.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    pub status: u16,
    /// HTTP reason phrase (e.g. "Bad Request").
    pub reason: String,
    /// Human-readable error message.
    pub error: String,
    /// The request path that caused the error.
    pub path: String,
}

impl ErrorBody {
    pub fn new(status: u16, error: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: now_ms(),
            status,
            reason: reason_phrase(status).into(),
            error: error.into(),
            path: path.into(),
        }
    }

    pub fn from_error(err: &MusicError, path: impl Into<String>) -> Self {
        Self::new(err.status(), err.to_string(), path)
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        502 => "Bad Gateway",
        504 => "Gateway Timeout",
        _ => "Internal Server Error",
    }
}
