//! IPFS error types.

use thiserror::Error;

/// IPFS deployment errors.
#[derive(Debug, Error)]
pub enum IpfsError {
    #[error("Pinner service not configured.")]
    PinnerNotConfigured,

    #[error("pinner {pinner} returned no content hash")]
    MissingHash { pinner: String },

    #[error("{pinner} pinned root {hash}, expected {expected}")]
    HashMismatch {
        pinner: String,
        hash: String,
        expected: String,
    },

    #[error("invalid IPFS API URL {url}: {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("{pinner} returned HTTP {status}: {message}")]
    Status {
        pinner: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {pinner}: {message}")]
    InvalidResponse { pinner: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for IPFS operations.
pub type IpfsResult<T> = std::result::Result<T, IpfsError>;
