//! Google Cloud DNS provider over the REST API.

use crate::error::{DnsError, DnsResult};
use crate::provider::DnsProvider;
use crate::records::{
    DnsChange, DnsRequest, PlannedChange, RecordFormat, RecordSet, RecordType, plan_changes,
    same_name,
};
use async_trait::async_trait;
use dshop_cloud::gcp::encode_component;
use dshop_cloud::{GcpClient, GcpRegistry, gcp_client};
use dshop_core::config::GcpConfig;
use dshop_core::{NetworkConfig, ResourceTag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZoneList {
    #[serde(default)]
    managed_zones: Vec<ManagedZone>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZone {
    name: String,
    dns_name: String,
}

#[derive(Debug, Deserialize)]
struct RrsetList {
    #[serde(default)]
    rrsets: Vec<Rrset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Rrset {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    ttl: u32,
    #[serde(default)]
    rrdatas: Vec<String>,
}

impl From<&RecordSet> for Rrset {
    fn from(set: &RecordSet) -> Self {
        Self {
            name: set.name.clone(),
            record_type: set.record_type.as_str().to_string(),
            ttl: set.ttl,
            rrdatas: set.values.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct ChangeRequest {
    additions: Vec<Rrset>,
    deletions: Vec<Rrset>,
}

async fn find_managed_zone(client: &GcpClient, dns_name: &str) -> DnsResult<Option<ManagedZone>> {
    let mut page_token: Option<String> = None;
    loop {
        let mut path = format!("managedZones?dnsName={}", encode_component(dns_name));
        if let Some(token) = &page_token {
            path.push_str(&format!("&pageToken={}", encode_component(token)));
        }
        let page: ManagedZoneList = client.get(&client.dns_url(&path)).await?;
        if let Some(zone) = page
            .managed_zones
            .into_iter()
            .find(|z| same_name(&z.dns_name, dns_name))
        {
            return Ok(Some(zone));
        }
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(None),
        }
    }
}

async fn list_rrsets(client: &GcpClient, zone: &str, name: &str) -> DnsResult<Vec<RecordSet>> {
    let path = format!(
        "managedZones/{}/rrsets?name={}",
        encode_component(zone),
        encode_component(name)
    );
    let list: RrsetList = client.get(&client.dns_url(&path)).await?;
    Ok(list
        .rrsets
        .into_iter()
        .filter(|r| same_name(&r.name, name))
        .filter_map(|r| {
            Some(RecordSet {
                record_type: RecordType::parse(&r.record_type)?,
                name: r.name,
                ttl: r.ttl,
                values: r.rrdatas,
            })
        })
        .collect())
}

/// Bring the subdomain and its DNSLink record to the requested state in one
/// Cloud DNS change.
pub async fn set_cloud_dns_records(
    client: &GcpClient,
    request: &DnsRequest,
) -> DnsResult<Vec<DnsChange>> {
    let format = RecordFormat::ZONE_FILE;
    let zone = find_managed_zone(client, &format.name(&request.zone))
        .await?
        .ok_or_else(|| DnsError::ZoneNotFound {
            zone: request.zone.clone(),
        })?;

    let mut existing = list_rrsets(client, &zone.name, &format.name(&request.fqdn())).await?;
    if request.hash.is_some() {
        existing.extend(
            list_rrsets(client, &zone.name, &format.name(&request.dnslink_name())).await?,
        );
    }

    let changes = plan_changes(request, &existing, format);
    if changes.is_empty() {
        debug!(zone = %zone.name, "Cloud DNS records already up to date");
        return Ok(Vec::new());
    }

    let mut body = ChangeRequest::default();
    for change in &changes {
        match change {
            PlannedChange::Delete(set) => body.deletions.push(set.into()),
            PlannedChange::Upsert { existing, desired } => {
                if let Some(existing) = existing {
                    body.deletions.push(existing.into());
                }
                body.additions.push(desired.into());
            }
        }
    }
    let path = format!("managedZones/{}/changes", encode_component(&zone.name));
    let _: serde_json::Value = client.post(&client.dns_url(&path), &body).await?;
    info!(zone = %zone.name, changes = changes.len(), "Cloud DNS records configured");
    Ok(changes.iter().map(DnsChange::from).collect())
}

/// The `gcp-dns` provider.
pub struct CloudDns {
    registry: Arc<GcpRegistry>,
    config: GcpConfig,
}

impl CloudDns {
    pub fn new(registry: Arc<GcpRegistry>, config: GcpConfig) -> Self {
        Self { registry, config }
    }
}

#[async_trait]
impl DnsProvider for CloudDns {
    fn name(&self) -> &'static str {
        "clouddns"
    }

    fn tag(&self) -> ResourceTag {
        ResourceTag::GcpDns
    }

    fn is_configured(&self, config: &NetworkConfig) -> bool {
        config.has_gcp_credentials()
    }

    #[instrument(skip(self, config, request), fields(provider = "clouddns", zone = %request.zone, subdomain = %request.subdomain))]
    async fn set_records(
        &self,
        config: &NetworkConfig,
        request: &DnsRequest,
    ) -> DnsResult<Vec<DnsChange>> {
        let credentials = config
            .gcp_credentials
            .as_deref()
            .ok_or_else(|| DnsError::Config("gcpCredentials not set".to_string()))?;
        let client = gcp_client(&self.registry, credentials, &self.config).await?;
        set_cloud_dns_records(&client, request).await
    }
}
