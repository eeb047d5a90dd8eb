//! Deployment lifecycle types and the wire formats the pipeline produces.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one deployment attempt.
///
/// A deployment is created `Pending` at lock time and mutated exactly once
/// to `Success` or `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Success,
    Failure,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Stable numeric error codes returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    General = 1000,
    DeploymentPending = 1002,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Message shown to the operator for this code.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::General => "Deployment failed. See the deployment history for details.",
            Self::DeploymentPending => {
                "A deployment is already in progress for this shop. Try again in a few minutes."
            }
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        match value {
            1000 => Ok(Self::General),
            1002 => Ok(Self::DeploymentPending),
            other => Err(format!("unknown error code {other}")),
        }
    }
}

/// Result of one bucket provider's deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDeployment {
    /// Provider-normalized bucket name.
    pub bucket_name: String,
    /// Provider URL, e.g. `s3://name` or `gs://name`.
    pub url: String,
    /// Public HTTP URL of the bucket.
    pub http_url: String,
}

/// What a CDN provider hands back for DNS to point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CdnConfiguration {
    Cname {
        cname: String,
    },
    IpAddress {
        #[serde(rename = "ipAddress")]
        ip_address: String,
    },
}

/// Outcome of a deploy job as returned to the caller.
///
/// Serialises as `{success: true, hash, domain, bucketHttpUrls}` or
/// `{success: false, error: true, id, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeployOutcome {
    Success {
        success: bool,
        hash: String,
        domain: Option<String>,
        #[serde(rename = "bucketHttpUrls")]
        bucket_http_urls: Vec<String>,
    },
    Failure {
        success: bool,
        error: bool,
        id: ErrorCode,
        message: String,
    },
}

impl DeployOutcome {
    pub fn success(hash: String, domain: Option<String>, bucket_http_urls: Vec<String>) -> Self {
        Self::Success {
            success: true,
            hash,
            domain,
            bucket_http_urls,
        }
    }

    pub fn failure(code: ErrorCode) -> Self {
        Self::Failure {
            success: false,
            error: true,
            id: code,
            message: code.user_message().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Failure { id, .. } => Some(*id),
            Self::Success { .. } => None,
        }
    }
}
