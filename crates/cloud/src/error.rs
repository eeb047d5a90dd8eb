//! Cloud client error types.

use thiserror::Error;

/// Errors raised while building clients or talking to provider REST APIs.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("operation {operation} did not finish after {attempts} polls")]
    OperationTimeout { operation: String, attempts: u32 },

    #[error("operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type for cloud client operations.
pub type CloudResult<T> = std::result::Result<T, CloudError>;
