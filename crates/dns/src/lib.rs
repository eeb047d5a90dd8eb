//! DNS providers and the DNS dispatcher for Dshop.
//!
//! Each provider points a shop subdomain at a gateway or CDN (CNAME) or at
//! explicit addresses (A), and publishes `_dnslink.<subdomain>` so IPFS
//! resolvers can find the content hash.

pub mod clouddns;
pub mod cloudflare;
pub mod error;
pub mod provider;
pub mod records;
pub mod route53;

pub use clouddns::CloudDns;
pub use cloudflare::CloudflareDns;
pub use error::{DnsError, DnsResult};
pub use provider::DnsProvider;
pub use records::{DnsChange, DnsRequest, DnsTarget, RecordSet, RecordType};
pub use route53::{Route53Api, Route53Dns};

use dshop_cloud::CloudClients;
use dshop_core::config::GcpConfig;
use dshop_core::{NetworkConfig, ResourceSelection};
use std::sync::Arc;
use tracing::warn;

/// Compile-time provider list, sorted by provider name.
pub fn default_dns_providers(
    clients: &CloudClients,
    gcp_config: &GcpConfig,
) -> Vec<Arc<dyn DnsProvider>> {
    let mut providers: Vec<Arc<dyn DnsProvider>> = vec![
        Arc::new(CloudflareDns::new()),
        Arc::new(CloudDns::new(Arc::clone(&clients.gcp), gcp_config.clone())),
        Arc::new(Route53Dns::new(Arc::clone(&clients.aws))),
    ];
    providers.sort_by_key(|p| p.name());
    providers
}

/// Run the one DNS provider the job selected.
///
/// Returns `Ok(None)` without touching DNS when no DNS tag is selected, when
/// the selected tag has no registered provider, or when the network lacks
/// that provider's credentials. Provider errors are returned to the caller.
pub async fn configure_shop_dns(
    providers: &[Arc<dyn DnsProvider>],
    config: &NetworkConfig,
    selection: &ResourceSelection,
    request: &DnsRequest,
) -> DnsResult<Option<Vec<DnsChange>>> {
    let Some(tag) = selection.dns_provider() else {
        warn!(subdomain = %request.subdomain, "No DNS provider selected");
        return Ok(None);
    };
    let Some(provider) = providers.iter().find(|p| p.tag() == tag) else {
        warn!(tag = %tag, "Unrecognized DNS provider");
        return Ok(None);
    };
    if !provider.is_configured(config) {
        warn!(provider = provider.name(), "DNS provider selected but not configured");
        return Ok(None);
    }
    provider.set_records(config, request).await.map(Some)
}
