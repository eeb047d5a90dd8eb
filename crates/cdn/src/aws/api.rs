//! The CloudFront, ACM and S3 calls the AWS CDN provider makes.

use crate::error::CdnResult;
use async_trait::async_trait;

/// Name of the shared cache policy.
pub const CACHE_POLICY_NAME: &str = "dshop-cache-policy";

/// A CloudFront distribution, reduced to what the provider reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSummary {
    pub id: String,
    /// `dxxxx.cloudfront.net`
    pub domain_name: String,
    pub aliases: Vec<String>,
}

/// Cache policy parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicySpec {
    pub name: String,
    pub min_ttl: i64,
    pub default_ttl: i64,
    pub max_ttl: i64,
    pub gzip: bool,
    pub brotli: bool,
}

impl Default for CachePolicySpec {
    fn default() -> Self {
        Self {
            name: CACHE_POLICY_NAME.to_string(),
            min_ttl: 30,
            default_ttl: 120,
            max_ttl: 300,
            gzip: true,
            brotli: false,
        }
    }
}

/// A new distribution in front of an S3 website endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    pub caller_reference: String,
    pub aliases: Vec<String>,
    /// Origin host, e.g. `bucket.s3-website-us-east-1.amazonaws.com`.
    pub origin_domain: String,
    pub cache_policy_id: String,
    pub certificate_arn: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    Issued,
    PendingValidation,
    Failed,
    Other(String),
}

impl CertificateStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "ISSUED" => Self::Issued,
            "PENDING_VALIDATION" => Self::PendingValidation,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// CNAME that proves control of a domain to ACM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRecord {
    pub name: String,
    pub value: String,
}

/// Per-domain validation state of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainValidation {
    pub domain: String,
    /// `DNS`, `EMAIL` or `HTTP`; absent until ACM fills it in.
    pub method: Option<String>,
    pub pending: bool,
    pub record: Option<ValidationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetail {
    pub arn: String,
    /// Primary domain plus subject alternative names.
    pub domains: Vec<String>,
    pub status: CertificateStatus,
    pub validations: Vec<DomainValidation>,
}

impl CertificateDetail {
    /// Whether the certificate covers every domain in `wanted`.
    pub fn covers(&self, wanted: &[String]) -> bool {
        wanted
            .iter()
            .all(|w| self.domains.iter().any(|d| d.eq_ignore_ascii_case(w)))
    }
}

#[async_trait]
pub trait CloudFrontApi: Send + Sync {
    /// Every distribution in the account.
    async fn list_distributions(&self) -> CdnResult<Vec<DistributionSummary>>;

    /// Id of the custom cache policy called `name`.
    async fn find_cache_policy(&self, name: &str) -> CdnResult<Option<String>>;

    async fn create_cache_policy(&self, spec: &CachePolicySpec) -> CdnResult<String>;

    async fn create_distribution(&self, spec: &DistributionSpec)
    -> CdnResult<DistributionSummary>;

    /// Returns the invalidation id.
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> CdnResult<String>;
}

#[async_trait]
pub trait AcmApi: Send + Sync {
    /// ARNs of issued and pending certificates.
    async fn list_certificates(&self) -> CdnResult<Vec<String>>;

    async fn describe_certificate(&self, arn: &str) -> CdnResult<CertificateDetail>;

    /// Request a DNS-validated certificate for `domains` (first is primary).
    async fn request_certificate(
        &self,
        domains: &[String],
        idempotency_token: &str,
    ) -> CdnResult<String>;
}

#[async_trait]
pub trait S3WebsiteApi: Send + Sync {
    async fn has_website(&self, bucket: &str) -> CdnResult<bool>;

    async fn put_website(&self, bucket: &str, index: &str, error: &str) -> CdnResult<()>;
}
