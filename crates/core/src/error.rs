//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid shop config: {0}")]
    InvalidShopConfig(String),

    #[error("shop config does not contain network {0}")]
    NetworkNotInShopConfig(i64),

    #[error("unknown resource tag: {0}")]
    UnknownResourceTag(String),

    #[error("invalid deployment status: {0}")]
    InvalidStatus(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
