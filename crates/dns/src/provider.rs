//! DNS provider trait.

use crate::error::DnsResult;
use crate::records::{DnsChange, DnsRequest};
use async_trait::async_trait;
use dshop_core::{NetworkConfig, ResourceTag};

/// A pluggable DNS provider.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// The resource selection tag that picks this provider.
    fn tag(&self) -> ResourceTag;

    /// Whether the network carries what this provider needs to authenticate.
    fn is_configured(&self, config: &NetworkConfig) -> bool;

    /// Point `request.subdomain` at its target and publish the DNSLink record.
    ///
    /// Calling this twice with the same request leaves the zone unchanged the
    /// second time.
    async fn set_records(
        &self,
        config: &NetworkConfig,
        request: &DnsRequest,
    ) -> DnsResult<Vec<DnsChange>>;
}
