//! Deploy pipeline error types.

use dshop_core::ErrorCode;
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lock,
    Build,
    Buckets,
    Ipfs,
    Dns,
    Record,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Build => "build",
            Self::Buckets => "buckets",
            Self::Ipfs => "ipfs",
            Self::Dns => "dns",
            Self::Record => "record",
        }
    }

    /// Message prefix persisted on the failed deployment row.
    fn description(&self) -> &'static str {
        match self {
            Self::Lock => "Failed to acquire deployment lock",
            Self::Build => "Failed to assemble build",
            Self::Buckets => "Failed to deploy to buckets",
            Self::Ipfs => "Failed to deploy to IPFS",
            Self::Dns => "Failed to configure DNS",
            Self::Record => "Failed to record deployment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Deploy pipeline errors.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("a deployment is already in progress for shop {shop_id}")]
    DuplicateDeployment { shop_id: i64 },

    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("shop {0} not found")]
    ShopNotFound(i64),

    #[error("network {0} not found")]
    NetworkNotFound(i64),

    #[error("shop {shop_id} has no successful deployment")]
    NoSuccessfulDeployment { shop_id: i64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] dshop_metadata::MetadataError),

    #[error("core error: {0}")]
    Core(#[from] dshop_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] dshop_storage::StorageError),

    #[error("CDN error: {0}")]
    Cdn(#[from] dshop_cdn::CdnError),

    #[error("DNS error: {0}")]
    Dns(#[from] dshop_dns::DnsError),

    #[error("IPFS error: {0}")]
    Ipfs(#[from] dshop_ipfs::IpfsError),
}

impl DeployError {
    /// Wrap an error raised inside `stage`.
    pub fn stage(stage: Stage, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Stage {
            stage,
            source: source.into(),
        }
    }

    /// Stage the error was raised in, if it came from a stage.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::DuplicateDeployment { .. } => Some(Stage::Lock),
            _ => None,
        }
    }

    /// Stable code returned to the caller.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateDeployment { .. } => ErrorCode::DeploymentPending,
            _ => ErrorCode::General,
        }
    }
}

/// Result type for deploy operations.
pub type DeployResult<T> = std::result::Result<T, DeployError>;
