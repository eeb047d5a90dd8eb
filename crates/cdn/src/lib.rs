//! CDN providers and the CDN orchestrator for Dshop.
//!
//! A CDN provider puts a distribution and a TLS certificate in front of the
//! bucket a previous deploy uploaded to, and reports what DNS should point
//! at: a CNAME (CloudFront) or a static IP (Cloud CDN).

pub mod aws;
pub mod error;
pub mod gcp;
pub mod provider;

pub use aws::AwsCdnProvider;
pub use error::{CdnError, CdnResult};
pub use gcp::GcpCdnProvider;
pub use provider::{CdnProvider, CdnRequest};

use dshop_cloud::CloudClients;
use dshop_core::config::GcpConfig;
use dshop_core::{CdnConfiguration, NetworkConfig, ResourceSelection};
use std::sync::Arc;
use tracing::{debug, info};

/// Compile-time provider list, sorted by provider name.
pub fn default_cdn_providers(
    clients: &CloudClients,
    gcp_config: &GcpConfig,
) -> Vec<Arc<dyn CdnProvider>> {
    let mut providers: Vec<Arc<dyn CdnProvider>> = vec![
        Arc::new(GcpCdnProvider::new(
            Arc::clone(&clients.gcp),
            gcp_config.clone(),
        )),
        Arc::new(AwsCdnProvider::new(Arc::clone(&clients.aws))),
    ];
    providers.sort_by_key(|p| p.name());
    providers
}

/// Configure every available CDN provider for the shop, in order.
///
/// The first failure aborts the loop; resources created by earlier providers
/// are left in place.
pub async fn configure_cdn_providers(
    providers: &[Arc<dyn CdnProvider>],
    config: &NetworkConfig,
    selection: &ResourceSelection,
    request: &CdnRequest<'_>,
) -> CdnResult<Vec<CdnConfiguration>> {
    let mut configurations = Vec::new();
    for provider in providers {
        if !provider.is_available(config, selection) {
            debug!(provider = provider.name(), "CDN provider not available");
            continue;
        }
        let configuration = provider.configure_cdn(config, request).await?;
        info!(provider = provider.name(), ?configuration, "CDN configured");
        configurations.push(configuration);
    }
    Ok(configurations)
}
