//! DNS error types.

use dshop_cloud::CloudError;
use thiserror::Error;

/// DNS provider errors.
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS zone not found: {zone}")]
    ZoneNotFound { zone: String },

    #[error("DNS request has no target: need a CNAME or at least one IP address")]
    MissingTarget,

    #[error("DNS API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Cloudflare API error: {0}")]
    Cloudflare(String),

    #[error("Route53 error: {0}")]
    Route53(Box<dyn std::error::Error + Send + Sync>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cloud client error: {0}")]
    Cloud(#[from] CloudError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DnsError {
    pub(crate) fn route53<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Route53(Box::new(err))
    }
}

/// Result type for DNS operations.
pub type DnsResult<T> = std::result::Result<T, DnsError>;
