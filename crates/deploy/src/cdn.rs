//! CDN call path: put the shop's buckets behind the selected CDNs.

use crate::error::{DeployError, DeployResult};
use crate::pipeline::{Deployer, network_zone};
use dshop_cdn::{CdnRequest, configure_cdn_providers};
use dshop_core::{CdnConfiguration, ResourceSelection};
use dshop_dns::{DnsRequest, configure_shop_dns};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// One CDN configuration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnJob {
    pub shop_id: i64,
    /// Label under the network's zone to point at the CDN.
    #[serde(default)]
    pub subdomain: Option<String>,
    /// Domains to serve. Defaults to `{subdomain}.{zone}`.
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub resource_selection: ResourceSelection,
}

impl Deployer {
    /// Configure every selected CDN over the buckets of the shop's latest
    /// successful deployment, then point the subdomain at the first result.
    #[instrument(skip_all, fields(shop_id = job.shop_id))]
    pub async fn configure_cdn(&self, job: &CdnJob) -> DeployResult<Vec<CdnConfiguration>> {
        let shop = self.load_shop(job.shop_id).await?;
        let network = self.load_network(shop.network_id).await?;
        let latest = self
            .metadata
            .latest_successful_deployment(shop.shop_id)
            .await?
            .ok_or(DeployError::NoSuccessfulDeployment {
                shop_id: shop.shop_id,
            })?;
        let bucket_urls = latest.bucket_urls()?;

        let subdomain = job
            .subdomain
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let domains = if job.domains.is_empty() {
            match subdomain {
                Some(subdomain) => vec![format!("{subdomain}.{}", network_zone(&network)?)],
                None => Vec::new(),
            }
        } else {
            job.domains.clone()
        };

        let request = CdnRequest {
            network: &network,
            shop: &shop,
            bucket_urls: &bucket_urls,
            domains: &domains,
        };
        let configurations = configure_cdn_providers(
            &self.cdn_providers,
            &network.config,
            &job.resource_selection,
            &request,
        )
        .await?;

        let Some(subdomain) = subdomain else {
            return Ok(configurations);
        };
        let Some(first) = configurations.first() else {
            warn!(subdomain, "No CDN configured, leaving DNS untouched");
            return Ok(configurations);
        };
        let (cname, ip_addresses) = match first {
            CdnConfiguration::Cname { cname } => (Some(cname.clone()), Vec::new()),
            CdnConfiguration::IpAddress { ip_address } => (None, vec![ip_address.clone()]),
        };
        let dns = DnsRequest::new(
            network_zone(&network)?,
            subdomain,
            cname,
            ip_addresses,
            latest.ipfs_hash.clone(),
        )?;
        configure_shop_dns(&self.dns_providers, &network.config, &job.resource_selection, &dns).await?;
        info!(hostname = %dns.fqdn(), "Pointed subdomain at CDN");
        Ok(configurations)
    }
}
