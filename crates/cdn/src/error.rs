//! CDN error types.

use dshop_cloud::CloudError;
use dshop_dns::DnsError;
use thiserror::Error;

/// CDN provider errors.
#[derive(Debug, Error)]
pub enum CdnError {
    #[error("no {scheme}:// bucket in the shop's latest deployment")]
    MissingBucket { scheme: &'static str },

    #[error("no domains requested")]
    NoDomains,

    #[error("certificate {arn} requires {method} validation; only DNS validation is supported")]
    UnsupportedValidation { arn: String, method: String },

    #[error("no hosted zone found for {name}")]
    ZoneNotFound { name: String },

    #[error("certificate {name} failed validation")]
    CertificateFailed { name: String },

    #[error("certificate {arn} is still pending validation; re-run once validation records have propagated")]
    CertificatePending { arn: String },

    #[error("certificate {arn} has no DNS validation records yet")]
    ValidationRecordsUnavailable { arn: String },

    #[error("CDN API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("AWS error: {0}")]
    Aws(Box<dyn std::error::Error + Send + Sync>),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("cloud client error: {0}")]
    Cloud(#[from] CloudError),

    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CdnError {
    pub(crate) fn aws<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Aws(Box::new(err))
    }
}

/// Result type for CDN operations.
pub type CdnResult<T> = std::result::Result<T, CdnError>;
