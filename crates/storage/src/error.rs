//! Storage error types.

use dshop_cloud::CloudError;
use thiserror::Error;

/// Bucket provider errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The bucket exists but we may not access it. Either another account owns
    /// the name or our own bucket denies us; the two cannot be told apart.
    #[error("bucket {bucket} exists but access is denied (owned by another account, or missing permissions)")]
    BucketConflict { bucket: String },

    #[error("storage returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("cloud client error: {0}")]
    Cloud(#[from] CloudError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// HTTP status of the failed request, if known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Cloud(e) => e.status(),
            _ => None,
        }
    }

    /// 502 from object storage is the one transient class worth retrying.
    pub fn is_bad_gateway(&self) -> bool {
        self.status() == Some(502)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
