//! Route53 DNS provider.
//!
//! Route53 names always end in a dot, and one `ChangeResourceRecordSets`
//! call applies the whole plan atomically.

use crate::error::{DnsError, DnsResult};
use crate::provider::DnsProvider;
use crate::records::{
    DnsChange, DnsRequest, PlannedChange, RecordFormat, RecordSet, RecordType, plan_changes,
    same_name, trim_dot,
};
use async_trait::async_trait;
use aws_sdk_route53::Client;
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::types::{
    Change, ChangeAction as Route53Action, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use dshop_cloud::{AwsCredentials, AwsRegistry, aws_clients};
use dshop_core::{NetworkConfig, ResourceTag};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A hosted zone, with the `/hostedzone/` prefix stripped from its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

/// The Route53 calls the pipeline makes.
#[async_trait]
pub trait Route53Api: Send + Sync {
    /// Find a hosted zone by exact name.
    async fn find_hosted_zone(&self, name: &str) -> DnsResult<Option<HostedZone>>;

    /// Record sets whose name is exactly `name`.
    async fn list_record_sets(&self, zone_id: &str, name: &str) -> DnsResult<Vec<RecordSet>>;

    /// Apply every change in one batch.
    async fn change_record_sets(&self, zone_id: &str, changes: &[PlannedChange])
    -> DnsResult<()>;
}

/// Find the hosted zone that owns `name`, trying each parent domain in turn.
pub async fn find_zone_for_name(
    api: &dyn Route53Api,
    name: &str,
) -> DnsResult<Option<HostedZone>> {
    let labels: Vec<&str> = trim_dot(name).split('.').collect();
    for start in 0..labels.len().saturating_sub(1) {
        let candidate = format!("{}.", labels[start..].join("."));
        if let Some(zone) = api.find_hosted_zone(&candidate).await? {
            return Ok(Some(zone));
        }
    }
    Ok(None)
}

/// Bring the subdomain and its DNSLink record to the requested state.
pub async fn set_route53_records(
    api: &dyn Route53Api,
    request: &DnsRequest,
) -> DnsResult<Vec<DnsChange>> {
    let format = RecordFormat::ZONE_FILE;
    let zone_name = format.name(&request.zone);
    let zone = api
        .find_hosted_zone(&zone_name)
        .await?
        .ok_or_else(|| DnsError::ZoneNotFound {
            zone: request.zone.clone(),
        })?;

    let mut existing = api
        .list_record_sets(&zone.id, &format.name(&request.fqdn()))
        .await?;
    if request.hash.is_some() {
        existing.extend(
            api.list_record_sets(&zone.id, &format.name(&request.dnslink_name()))
                .await?,
        );
    }

    let changes = plan_changes(request, &existing, format);
    if changes.is_empty() {
        debug!(zone = %zone.name, "Route53 records already up to date");
        return Ok(Vec::new());
    }
    api.change_record_sets(&zone.id, &changes).await?;
    info!(zone = %zone.name, changes = changes.len(), "Route53 records configured");
    Ok(changes.iter().map(DnsChange::from).collect())
}

/// [`Route53Api`] over the AWS SDK.
#[derive(Debug, Clone)]
pub struct SdkRoute53 {
    client: Client,
}

impl SdkRoute53 {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn sdk_error<E>(err: aws_sdk_route53::error::SdkError<E>) -> DnsError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match err.raw_response().map(|raw| raw.status().as_u16()) {
        Some(status) => DnsError::Status {
            status,
            message: DisplayErrorContext(&err).to_string(),
        },
        None => DnsError::route53(err),
    }
}

fn to_sdk_set(set: &RecordSet) -> DnsResult<ResourceRecordSet> {
    let records = set
        .values
        .iter()
        .map(|value| {
            ResourceRecord::builder()
                .value(value)
                .build()
                .map_err(DnsError::route53)
        })
        .collect::<DnsResult<Vec<_>>>()?;
    ResourceRecordSet::builder()
        .name(&set.name)
        .r#type(RrType::from(set.record_type.as_str()))
        .ttl(i64::from(set.ttl))
        .set_resource_records(Some(records))
        .build()
        .map_err(DnsError::route53)
}

#[async_trait]
impl Route53Api for SdkRoute53 {
    async fn find_hosted_zone(&self, name: &str) -> DnsResult<Option<HostedZone>> {
        let mut dns_name = Some(name.to_string());
        let mut zone_id: Option<String> = None;
        while let Some(start) = dns_name.take() {
            let output = self
                .client
                .list_hosted_zones_by_name()
                .dns_name(&start)
                .set_hosted_zone_id(zone_id.take())
                .send()
                .await
                .map_err(sdk_error)?;
            if let Some(zone) = output
                .hosted_zones()
                .iter()
                .find(|z| same_name(z.name(), name))
            {
                return Ok(Some(HostedZone {
                    id: zone.id().trim_start_matches("/hostedzone/").to_string(),
                    name: zone.name().to_string(),
                }));
            }
            // Results are sorted by name; once past `name` it cannot appear.
            let past = output
                .hosted_zones()
                .last()
                .is_some_and(|z| !same_name(z.name(), name));
            if output.is_truncated() && !past {
                dns_name = output.next_dns_name().map(str::to_string);
                zone_id = output.next_hosted_zone_id().map(str::to_string);
            }
        }
        Ok(None)
    }

    async fn list_record_sets(&self, zone_id: &str, name: &str) -> DnsResult<Vec<RecordSet>> {
        let mut sets = Vec::new();
        let mut next = Some(name.to_string());
        while let Some(start) = next.take() {
            let output = self
                .client
                .list_resource_record_sets()
                .hosted_zone_id(zone_id)
                .start_record_name(&start)
                .send()
                .await
                .map_err(sdk_error)?;
            for set in output.resource_record_sets() {
                if !same_name(set.name(), name) {
                    continue;
                }
                let Some(record_type) = RecordType::parse(set.r#type().as_str()) else {
                    continue;
                };
                sets.push(RecordSet {
                    name: set.name().to_string(),
                    record_type,
                    ttl: set
                        .ttl()
                        .and_then(|ttl| u32::try_from(ttl).ok())
                        .unwrap_or_default(),
                    values: set
                        .resource_records()
                        .iter()
                        .map(|r| r.value().to_string())
                        .collect(),
                });
            }
            if output.is_truncated()
                && output
                    .next_record_name()
                    .is_some_and(|next_name| same_name(next_name, name))
            {
                next = output.next_record_name().map(str::to_string);
            }
        }
        Ok(sets)
    }

    async fn change_record_sets(
        &self,
        zone_id: &str,
        changes: &[PlannedChange],
    ) -> DnsResult<()> {
        let changes = changes
            .iter()
            .map(|change| {
                let (action, set) = match change {
                    PlannedChange::Delete(set) => (Route53Action::Delete, set),
                    PlannedChange::Upsert { desired, .. } => (Route53Action::Upsert, desired),
                };
                Change::builder()
                    .action(action)
                    .resource_record_set(to_sdk_set(set)?)
                    .build()
                    .map_err(DnsError::route53)
            })
            .collect::<DnsResult<Vec<_>>>()?;
        let batch = ChangeBatch::builder()
            .comment("dshop deploy")
            .set_changes(Some(changes))
            .build()
            .map_err(DnsError::route53)?;
        self.client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

/// The `aws-dns` provider.
pub struct Route53Dns {
    registry: Arc<AwsRegistry>,
}

impl Route53Dns {
    pub fn new(registry: Arc<AwsRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl DnsProvider for Route53Dns {
    fn name(&self) -> &'static str {
        "route53"
    }

    fn tag(&self) -> ResourceTag {
        ResourceTag::AwsDns
    }

    /// Route53 falls back to ambient credentials (an instance role), so it
    /// is always considered configured.
    fn is_configured(&self, _config: &NetworkConfig) -> bool {
        true
    }

    #[instrument(skip(self, config, request), fields(provider = "route53", zone = %request.zone, subdomain = %request.subdomain))]
    async fn set_records(
        &self,
        config: &NetworkConfig,
        request: &DnsRequest,
    ) -> DnsResult<Vec<DnsChange>> {
        let credentials = if config.has_aws_credentials() {
            AwsCredentials::from_network_config(config)?
        } else {
            debug!("No explicit AWS credentials, using ambient credentials");
            AwsCredentials::ambient(config.aws_region())
        };
        let clients = aws_clients(&self.registry, &credentials).await;
        set_route53_records(&SdkRoute53::new(clients.route53()), request).await
    }
}
