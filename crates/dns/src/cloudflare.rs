//! Cloudflare DNS over the v4 REST API.

use crate::error::{DnsError, DnsResult};
use crate::provider::DnsProvider;
use crate::records::{
    DnsChange, DnsRequest, PlannedChange, RecordFormat, RecordSet, RecordType, plan_changes,
    same_name,
};
use async_trait::async_trait;
use dshop_core::{NetworkConfig, ResourceTag};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, instrument};

const CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4";
const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    #[serde(default)]
    ttl: u32,
}

/// API key credentials for one Cloudflare account.
struct Credentials<'a> {
    email: &'a str,
    api_key: &'a str,
}

/// The `cloudflare-dns` provider.
#[derive(Debug, Clone)]
pub struct CloudflareDns {
    http: reqwest::Client,
    base_url: String,
}

impl Default for CloudflareDns {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudflareDns {
    pub fn new() -> Self {
        Self::with_base_url(CLOUDFLARE_API)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, creds: &Credentials<'_>, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base_url, path))
            .header("X-Auth-Email", creds.email)
            .header("X-Auth-Key", creds.api_key)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> DnsResult<(Option<T>, Option<ResultInfo>)> {
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(DnsError::Status {
                    status: status.as_u16(),
                    message: body,
                });
            }
            Err(e) => return Err(DnsError::Cloudflare(format!("invalid response: {e}"))),
        };
        if !envelope.success || !status.is_success() {
            let message = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DnsError::Cloudflare(message));
        }
        Ok((envelope.result, envelope.result_info))
    }

    async fn find_zone(&self, creds: &Credentials<'_>, zone: &str) -> DnsResult<String> {
        let mut page = 1;
        loop {
            let req = self
                .request(creds, Method::GET, "zones")
                .query(&[("name", zone)])
                .query(&[("page", page), ("per_page", PAGE_SIZE)]);
            let (zones, info) = self.send::<Vec<Zone>>(req).await?;
            if let Some(found) = zones
                .unwrap_or_default()
                .into_iter()
                .find(|z| same_name(&z.name, zone))
            {
                return Ok(found.id);
            }
            match info {
                Some(info) if info.page < info.total_pages => page = info.page + 1,
                _ => {
                    return Err(DnsError::ZoneNotFound {
                        zone: zone.to_string(),
                    });
                }
            }
        }
    }

    async fn list_records(
        &self,
        creds: &Credentials<'_>,
        zone_id: &str,
        name: &str,
    ) -> DnsResult<Vec<DnsRecord>> {
        let req = self
            .request(creds, Method::GET, &format!("zones/{zone_id}/dns_records"))
            .query(&[("name", name)])
            .query(&[("per_page", 100)]);
        let (records, _) = self.send::<Vec<DnsRecord>>(req).await?;
        Ok(records.unwrap_or_default())
    }

    async fn delete_record(
        &self,
        creds: &Credentials<'_>,
        zone_id: &str,
        record: &DnsRecord,
    ) -> DnsResult<()> {
        let req = self.request(
            creds,
            Method::DELETE,
            &format!("zones/{zone_id}/dns_records/{}", record.id),
        );
        self.send::<serde_json::Value>(req).await?;
        debug!(name = %record.name, record_type = %record.record_type, "Deleted record");
        Ok(())
    }

    async fn write_record(
        &self,
        creds: &Credentials<'_>,
        zone_id: &str,
        existing_id: Option<&str>,
        set: &RecordSet,
        content: &str,
    ) -> DnsResult<()> {
        let body = json!({
            "type": set.record_type.as_str(),
            "name": set.name,
            "content": content,
            "ttl": set.ttl,
            "proxied": false,
        });
        let req = match existing_id {
            Some(id) => self.request(
                creds,
                Method::PUT,
                &format!("zones/{zone_id}/dns_records/{id}"),
            ),
            None => self.request(creds, Method::POST, &format!("zones/{zone_id}/dns_records")),
        };
        self.send::<serde_json::Value>(req.json(&body)).await?;
        Ok(())
    }

    /// Apply one planned change. Cloudflare stores one record per value, so
    /// a set maps onto several records.
    async fn apply(
        &self,
        creds: &Credentials<'_>,
        zone_id: &str,
        existing: &[DnsRecord],
        change: &PlannedChange,
    ) -> DnsResult<()> {
        let records_of = |set: &RecordSet| -> Vec<&DnsRecord> {
            existing
                .iter()
                .filter(|r| {
                    r.record_type == set.record_type.as_str() && same_name(&r.name, &set.name)
                })
                .collect()
        };
        match change {
            PlannedChange::Delete(set) => {
                for record in records_of(set) {
                    self.delete_record(creds, zone_id, record).await?;
                }
            }
            PlannedChange::Upsert {
                existing: current,
                desired,
            } => {
                let current = current.as_ref().map(records_of).unwrap_or_default();
                let missing = desired
                    .values
                    .iter()
                    .filter(|v| !current.iter().any(|r| &r.content == *v));
                // Stale records are rewritten in place first, the rest deleted.
                let mut stale = current
                    .iter()
                    .filter(|r| !desired.values.contains(&r.content));
                for value in missing {
                    let slot = stale.next().map(|r| r.id.as_str());
                    self.write_record(creds, zone_id, slot, desired, value)
                        .await?;
                }
                for record in stale {
                    self.delete_record(creds, zone_id, record).await?;
                }
            }
        }
        Ok(())
    }
}

fn to_sets(records: &[DnsRecord]) -> Vec<RecordSet> {
    let mut sets: Vec<RecordSet> = Vec::new();
    for record in records {
        let Some(record_type) = RecordType::parse(&record.record_type) else {
            continue;
        };
        match sets
            .iter_mut()
            .find(|s| s.record_type == record_type && same_name(&s.name, &record.name))
        {
            Some(set) => set.values.push(record.content.clone()),
            None => sets.push(RecordSet {
                name: record.name.clone(),
                record_type,
                ttl: record.ttl,
                values: vec![record.content.clone()],
            }),
        }
    }
    sets
}

#[async_trait]
impl DnsProvider for CloudflareDns {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    fn tag(&self) -> ResourceTag {
        ResourceTag::CloudflareDns
    }

    fn is_configured(&self, config: &NetworkConfig) -> bool {
        config.has_cloudflare_credentials()
    }

    #[instrument(skip(self, config, request), fields(provider = "cloudflare", zone = %request.zone, subdomain = %request.subdomain))]
    async fn set_records(
        &self,
        config: &NetworkConfig,
        request: &DnsRequest,
    ) -> DnsResult<Vec<DnsChange>> {
        let (Some(email), Some(api_key)) = (
            config.cloudflare_email.as_deref(),
            config.cloudflare_api_key.as_deref(),
        ) else {
            return Err(DnsError::Config(
                "cloudflareEmail and cloudflareApiKey are required".to_string(),
            ));
        };
        let creds = Credentials { email, api_key };

        let zone_id = self.find_zone(&creds, &request.zone).await?;
        let mut existing = self.list_records(&creds, &zone_id, &request.fqdn()).await?;
        if request.hash.is_some() {
            existing.extend(
                self.list_records(&creds, &zone_id, &request.dnslink_name())
                    .await?,
            );
        }

        let changes = plan_changes(request, &to_sets(&existing), RecordFormat::PLAIN);
        for change in &changes {
            self.apply(&creds, &zone_id, &existing, change).await?;
        }
        info!(changes = changes.len(), "Cloudflare records configured");
        Ok(changes.iter().map(DnsChange::from).collect())
    }
}
