//! Google Cloud CDN provider over the Compute Engine REST API.
//!
//! Resources are derived from the shop bucket name:
//!
//! ```text
//! {base}-backend       backendBucket (CDN enabled) wrapping the GCS bucket
//! {base}-url-map       urlMap routing every path to the backend
//! {base}-cert[-N]      managed SSL certificate chain
//! {base}-https-proxy   targetHttpsProxy  -> url map + newest certificate
//! {base}-http-proxy    targetHttpProxy   -> url map
//! {base}-address       global static IP
//! {base}-https-rule    forwarding rule 443 -> https proxy
//! {base}-http-rule     forwarding rule 80  -> http proxy
//! ```
//!
//! Managed certificates and the certificate list of an HTTPS proxy cannot be
//! changed in place, so a domain change creates the next certificate in the
//! chain and recreates the proxy (and its forwarding rule) around it.

use crate::error::{CdnError, CdnResult};
use crate::provider::{CdnProvider, CdnRequest};
use async_trait::async_trait;
use dshop_cloud::gcp::{Operation, encode_component};
use dshop_cloud::{GcpClient, GcpRegistry, gcp_client};
use dshop_core::config::GcpConfig;
use dshop_core::{
    CdnConfiguration, IncrementalName, NetworkConfig, ResourceSelection, ResourceTag,
};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Certificate generations kept after a new one is created.
pub const CERTIFICATES_KEPT: usize = 2;

/// Compute resource names are limited to 63 characters; leave room for suffixes.
const MAX_BASE_LEN: usize = 40;

/// Base name for every compute resource of a bucket.
///
/// Compute names must match `[a-z]([-a-z0-9]*[a-z0-9])?`.
pub fn resource_base(bucket: &str) -> String {
    let mut base: String = bucket
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-') => c,
            _ => '-',
        })
        .collect();
    if !base.starts_with(|c: char| c.is_ascii_lowercase()) {
        base.insert_str(0, "d-");
    }
    base.truncate(MAX_BASE_LEN);
    base.trim_end_matches('-').to_string()
}

/// Names of the compute resources serving one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpCdnNames {
    pub backend_bucket: String,
    pub url_map: String,
    pub certificate_base: String,
    pub https_proxy: String,
    pub http_proxy: String,
    pub address: String,
    pub https_rule: String,
    pub http_rule: String,
}

impl GcpCdnNames {
    pub fn for_bucket(bucket: &str) -> Self {
        let base = resource_base(bucket);
        Self {
            backend_bucket: format!("{base}-backend"),
            url_map: format!("{base}-url-map"),
            certificate_base: format!("{base}-cert"),
            https_proxy: format!("{base}-https-proxy"),
            http_proxy: format!("{base}-http-proxy"),
            address: format!("{base}-address"),
            https_rule: format!("{base}-https-rule"),
            http_rule: format!("{base}-http-rule"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
struct ResourceList<T> {
    #[serde(default)]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SslCertificate {
    name: String,
    #[serde(default)]
    managed: Option<ManagedCertificate>,
}

#[derive(Debug, Deserialize)]
struct ManagedCertificate {
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Managed-certificate states GCP never recovers from on its own.
const FAILED_CERTIFICATE_STATES: [&str; 3] = [
    "FAILED_NOT_VISIBLE",
    "PROVISIONING_FAILED",
    "PROVISIONING_FAILED_PERMANENTLY",
];

impl ManagedCertificate {
    fn has_failed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| FAILED_CERTIFICATE_STATES.contains(&status))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetHttpsProxy {
    #[serde(default)]
    ssl_certificates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Address {
    #[serde(default)]
    address: Option<String>,
}

fn same_domains(current: &[String], wanted: &[String]) -> bool {
    let normalize = |domains: &[String]| {
        let mut domains: Vec<String> = domains
            .iter()
            .map(|d| d.trim_end_matches('.').to_ascii_lowercase())
            .collect();
        domains.sort();
        domains.dedup();
        domains
    };
    normalize(current) == normalize(wanted)
}

async fn exists(client: &GcpClient, collection: &str, name: &str) -> CdnResult<bool> {
    let url = client.compute_url(&format!("{collection}/{}", encode_component(name)));
    Ok(client.get_optional::<IgnoredAny>(&url).await?.is_some())
}

async fn list_certificates(client: &GcpClient) -> CdnResult<Vec<SslCertificate>> {
    let mut certificates = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut path = "sslCertificates".to_string();
        if let Some(token) = &page_token {
            path.push_str(&format!("?pageToken={}", encode_component(token)));
        }
        let page: ResourceList<SslCertificate> = client.get(&client.compute_url(&path)).await?;
        certificates.extend(page.items);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(certificates),
        }
    }
}

async fn ensure_backend_bucket(client: &GcpClient, name: &str, bucket: &str) -> CdnResult<()> {
    if exists(client, "backendBuckets", name).await? {
        return Ok(());
    }
    client
        .compute_insert(
            "backendBuckets",
            &json!({ "name": name, "bucketName": bucket, "enableCdn": true }),
        )
        .await?;
    info!(backend_bucket = name, bucket, "Created backend bucket");
    Ok(())
}

/// Create the URL map, or invalidate everything behind an existing one.
async fn ensure_url_map(client: &GcpClient, name: &str, backend_bucket: &str) -> CdnResult<()> {
    if exists(client, "urlMaps", name).await? {
        let url = client.compute_url(&format!("urlMaps/{}/invalidateCache", encode_component(name)));
        let operation: Operation = client.post(&url, &json!({ "path": "/*" })).await?;
        client.wait_for_operation(operation).await?;
        info!(url_map = name, "Invalidated CDN cache");
        return Ok(());
    }
    client
        .compute_insert(
            "urlMaps",
            &json!({
                "name": name,
                "defaultService": client.compute_link("backendBuckets", backend_bucket),
            }),
        )
        .await?;
    info!(url_map = name, "Created URL map");
    Ok(())
}

/// The certificate to serve `domains` with, plus whether it was just created.
async fn ensure_certificate(
    client: &GcpClient,
    base: &str,
    domains: &[String],
) -> CdnResult<(String, bool)> {
    let certificates = list_certificates(client).await?;
    let names: Vec<&str> = certificates.iter().map(|c| c.name.as_str()).collect();

    if let Some(newest) = IncrementalName::chain(base, names.iter().copied()).first() {
        let newest_name = newest.name();
        let managed = certificates
            .iter()
            .find(|c| c.name == newest_name)
            .and_then(|c| c.managed.as_ref());
        let current = managed.map(|m| m.domains.as_slice()).unwrap_or_default();
        if same_domains(current, domains) {
            if managed.is_some_and(ManagedCertificate::has_failed) {
                return Err(CdnError::CertificateFailed { name: newest_name });
            }
            debug!(certificate = %newest_name, "Reusing managed certificate");
            return Ok((newest_name, false));
        }
    }

    let next = IncrementalName::next_in_chain(base, names.iter().copied()).name();
    client
        .compute_insert(
            "sslCertificates",
            &json!({
                "name": next,
                "type": "MANAGED",
                "managed": { "domains": domains },
            }),
        )
        .await?;
    info!(certificate = %next, domains = ?domains, "Created managed certificate");

    let mut chain: Vec<&str> = names;
    chain.push(&next);
    for stale in IncrementalName::prunable(base, chain, CERTIFICATES_KEPT) {
        let stale = stale.name();
        match client.compute_delete("sslCertificates", &stale).await {
            Ok(_) => debug!(certificate = %stale, "Pruned certificate"),
            Err(e) => warn!(certificate = %stale, error = %e, "Failed to prune certificate"),
        }
    }
    Ok((next, true))
}

async fn insert_forwarding_rule(
    client: &GcpClient,
    name: &str,
    ip_address: &str,
    port: u16,
    target: String,
) -> CdnResult<()> {
    client
        .compute_insert(
            "forwardingRules",
            &json!({
                "name": name,
                "IPAddress": ip_address,
                "IPProtocol": "TCP",
                "portRange": port.to_string(),
                "target": target,
                "loadBalancingScheme": "EXTERNAL",
            }),
        )
        .await?;
    info!(forwarding_rule = name, port, "Created forwarding rule");
    Ok(())
}

async fn reserve_address(client: &GcpClient, name: &str) -> CdnResult<String> {
    let url = client.compute_url(&format!("addresses/{}", encode_component(name)));
    let address = match client.get_optional::<Address>(&url).await? {
        Some(address) => address,
        None => {
            client.compute_insert("addresses", &json!({ "name": name })).await?;
            info!(address = name, "Reserved global address");
            client.get(&url).await?
        }
    };
    address
        .address
        .ok_or_else(|| CdnError::InvalidResponse(format!("address {name} has no IP")))
}

/// Run the full Cloud CDN configuration for one shop.
#[instrument(skip(client, request), fields(provider = "gcp", shop_id = request.shop.shop_id))]
pub async fn configure_cloud_cdn(
    client: &GcpClient,
    request: &CdnRequest<'_>,
) -> CdnResult<CdnConfiguration> {
    let bucket = request
        .bucket("gs")
        .ok_or(CdnError::MissingBucket { scheme: "gs" })?;
    if request.domains.is_empty() {
        return Err(CdnError::NoDomains);
    }
    let names = GcpCdnNames::for_bucket(bucket);

    ensure_backend_bucket(client, &names.backend_bucket, bucket).await?;
    ensure_url_map(client, &names.url_map, &names.backend_bucket).await?;
    let url_map_link = client.compute_link("urlMaps", &names.url_map);

    let (certificate, created) =
        ensure_certificate(client, &names.certificate_base, request.domains).await?;
    let certificate_suffix = format!("/sslCertificates/{certificate}");

    // HTTPS proxy, recreated whenever it points at another certificate.
    let proxy_url = client.compute_url(&format!(
        "targetHttpsProxies/{}",
        encode_component(&names.https_proxy)
    ));
    let mut https_rule_missing = false;
    let proxy = client.get_optional::<TargetHttpsProxy>(&proxy_url).await?;
    let stale = proxy.as_ref().is_some_and(|p| {
        created || !p.ssl_certificates.iter().any(|c| c.ends_with(&certificate_suffix))
    });
    if stale {
        if exists(client, "forwardingRules", &names.https_rule).await? {
            client
                .compute_delete("forwardingRules", &names.https_rule)
                .await?;
        }
        https_rule_missing = true;
        client
            .compute_delete("targetHttpsProxies", &names.https_proxy)
            .await?;
        info!(proxy = %names.https_proxy, "Deleted HTTPS proxy for certificate change");
    }
    if proxy.is_none() || stale {
        client
            .compute_insert(
                "targetHttpsProxies",
                &json!({
                    "name": names.https_proxy,
                    "urlMap": url_map_link,
                    "sslCertificates": [client.compute_link("sslCertificates", &certificate)],
                }),
            )
            .await?;
        info!(proxy = %names.https_proxy, certificate = %certificate, "Created HTTPS proxy");
    }

    if !exists(client, "targetHttpProxies", &names.http_proxy).await? {
        client
            .compute_insert(
                "targetHttpProxies",
                &json!({ "name": names.http_proxy, "urlMap": url_map_link }),
            )
            .await?;
        info!(proxy = %names.http_proxy, "Created HTTP proxy");
    }

    let ip_address = reserve_address(client, &names.address).await?;

    if https_rule_missing || !exists(client, "forwardingRules", &names.https_rule).await? {
        let target = client.compute_link("targetHttpsProxies", &names.https_proxy);
        insert_forwarding_rule(client, &names.https_rule, &ip_address, 443, target).await?;
    }
    if !exists(client, "forwardingRules", &names.http_rule).await? {
        let target = client.compute_link("targetHttpProxies", &names.http_proxy);
        insert_forwarding_rule(client, &names.http_rule, &ip_address, 80, target).await?;
    }

    info!(ip_address = %ip_address, "Cloud CDN configured");
    Ok(CdnConfiguration::IpAddress { ip_address })
}

/// The `gcp-cdn` provider.
pub struct GcpCdnProvider {
    registry: Arc<GcpRegistry>,
    config: GcpConfig,
}

impl GcpCdnProvider {
    pub fn new(registry: Arc<GcpRegistry>, config: GcpConfig) -> Self {
        Self { registry, config }
    }
}

#[async_trait]
impl CdnProvider for GcpCdnProvider {
    fn name(&self) -> &'static str {
        "gcp"
    }

    fn is_available(&self, config: &NetworkConfig, selection: &ResourceSelection) -> bool {
        selection.contains(ResourceTag::GcpCdn) && config.has_gcp_credentials()
    }

    async fn configure_cdn(
        &self,
        config: &NetworkConfig,
        request: &CdnRequest<'_>,
    ) -> CdnResult<CdnConfiguration> {
        let credentials = config
            .gcp_credentials
            .as_deref()
            .ok_or_else(|| CdnError::Config("gcpCredentials not set".to_string()))?;
        let client = gcp_client(&self.registry, credentials, &self.config).await?;
        configure_cloud_cdn(&client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_base() {
        assert_eq!(resource_base("dshop-mainnet-abc123"), "dshop-mainnet-abc123");
        assert_eq!(resource_base("dshop.mainnet.abc"), "dshop-mainnet-abc");
        assert_eq!(resource_base("1shop"), "d-1shop");
        let long = resource_base(&"a".repeat(63));
        assert_eq!(long.len(), MAX_BASE_LEN);
    }

    #[test]
    fn test_resource_base_trims_separator_after_truncation() {
        let bucket = format!("{}-tail", "a".repeat(MAX_BASE_LEN - 1));
        assert!(!resource_base(&bucket).ends_with('-'));
    }

    #[test]
    fn test_same_domains_ignores_order_and_case() {
        let wanted = vec!["shop.ogn.app".to_string(), "www.shop.ogn.app".to_string()];
        assert!(same_domains(
            &["WWW.shop.ogn.app.".to_string(), "shop.ogn.app".to_string()],
            &wanted
        ));
        assert!(!same_domains(&["shop.ogn.app".to_string()], &wanted));
    }

    #[test]
    fn test_names_for_bucket() {
        let names = GcpCdnNames::for_bucket("dshop-localhost-token1");
        assert_eq!(names.backend_bucket, "dshop-localhost-token1-backend");
        assert_eq!(names.certificate_base, "dshop-localhost-token1-cert");
        assert_eq!(names.https_rule, "dshop-localhost-token1-https-rule");
    }
}
