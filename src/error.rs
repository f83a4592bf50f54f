use crate::classifier::ErrorCategory;
use thiserror::Error;

/// Failures of a single backend call, before any domain interpretation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend replied with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected backend reply: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{message}")]
    Connect {
        category: ErrorCategory,
        message: String,
    },

    #[error("No session available: {0}")]
    SessionProbe(String),

    #[error("Failed to set bucket {bucket}: {reason}")]
    SetBucket { bucket: String, reason: String },

    #[error("Failed to list objects under '{prefix}': {reason}")]
    Listing { prefix: String, reason: String },

    #[error("Failed to get size of folder {prefix}: {reason}")]
    Size { prefix: String, reason: String },

    #[error("Invalid folder key '{0}'")]
    InvalidPath(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, BrowserError>;
