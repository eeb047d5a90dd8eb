//! CDN provider trait.

use crate::error::CdnResult;
use async_trait::async_trait;
use dshop_core::{CdnConfiguration, Network, NetworkConfig, ResourceSelection, Shop};

/// Everything a CDN provider needs for one shop.
#[derive(Debug, Clone, Copy)]
pub struct CdnRequest<'a> {
    pub network: &'a Network,
    pub shop: &'a Shop,
    /// `bucketUrls` of the shop's latest successful deployment.
    pub bucket_urls: &'a [String],
    /// Domains to serve; the first is the primary.
    pub domains: &'a [String],
}

impl CdnRequest<'_> {
    /// The first bucket URL with the given scheme, without the scheme.
    pub fn bucket(&self, scheme: &str) -> Option<&str> {
        let prefix = format!("{scheme}://");
        self.bucket_urls
            .iter()
            .find_map(|url| url.strip_prefix(&prefix))
            .map(|rest| rest.trim_end_matches('/'))
    }

    pub fn primary_domain(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }
}

/// A pluggable CDN provider.
///
/// Client setup happens inside `configure_cdn` through the credential
/// registry, so providers hold no per-network state.
#[async_trait]
pub trait CdnProvider: Send + Sync {
    /// Provider name; the orchestrator runs providers sorted by it.
    fn name(&self) -> &'static str;

    /// Whether the job selected this provider and the network configured it.
    fn is_available(&self, config: &NetworkConfig, selection: &ResourceSelection) -> bool;

    /// Provision or reuse the distribution and certificate for the shop.
    async fn configure_cdn(
        &self,
        config: &NetworkConfig,
        request: &CdnRequest<'_>,
    ) -> CdnResult<CdnConfiguration>;
}
