//! Network records and their decrypted provider credentials.

use serde::{Deserialize, Serialize};

/// Per-network provider credentials, already decrypted by the caller.
///
/// Field names follow the camelCase keys of the stored network config.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: Option<String>,
    /// Service account key JSON.
    pub gcp_credentials: Option<String>,
    pub cloudflare_email: Option<String>,
    pub cloudflare_api_key: Option<String>,
    pub pinata_key: Option<String>,
    pub pinata_secret: Option<String>,
    pub ipfs_cluster_user: Option<String>,
    pub ipfs_cluster_password: Option<String>,
    /// DNS zone subdomains are created under, e.g. `ogn.app`.
    pub domain: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl NetworkConfig {
    pub fn has_aws_credentials(&self) -> bool {
        present(&self.aws_access_key_id) && present(&self.aws_secret_access_key)
    }

    pub fn has_gcp_credentials(&self) -> bool {
        present(&self.gcp_credentials)
    }

    pub fn has_cloudflare_credentials(&self) -> bool {
        present(&self.cloudflare_email) && present(&self.cloudflare_api_key)
    }

    pub fn has_pinata_credentials(&self) -> bool {
        present(&self.pinata_key) && present(&self.pinata_secret)
    }

    pub fn has_cluster_credentials(&self) -> bool {
        present(&self.ipfs_cluster_user) && present(&self.ipfs_cluster_password)
    }

    /// AWS region, defaulting to `us-east-1`.
    pub fn aws_region(&self) -> &str {
        self.aws_region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or("us-east-1")
    }
}

impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("aws", &self.has_aws_credentials())
            .field("aws_region", &self.aws_region)
            .field("gcp", &self.has_gcp_credentials())
            .field("cloudflare", &self.has_cloudflare_credentials())
            .field("pinata", &self.has_pinata_credentials())
            .field("ipfs_cluster", &self.has_cluster_credentials())
            .field("domain", &self.domain)
            .finish()
    }
}

/// A blockchain network a shop is deployed against.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub network_id: i64,
    /// Human name, e.g. `mainnet` or `localhost`. Part of bucket names.
    pub name: String,
    /// Gateway URL subdomains are CNAMEd to, e.g. `https://ipfs.ogn.app`.
    pub ipfs_gateway: Option<String>,
    /// IPFS HTTP API: a cluster endpoint, or a local node when on localhost.
    pub ipfs_api: Option<String>,
    pub config: NetworkConfig,
}

impl Network {
    /// Hostname of the gateway, for use as a CNAME target.
    pub fn gateway_host(&self) -> Option<String> {
        let gateway = self.ipfs_gateway.as_deref()?;
        let without_scheme = gateway
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(gateway);
        let host = without_scheme
            .split(['/', ':'])
            .next()
            .unwrap_or_default()
            .trim();
        (!host.is_empty()).then(|| host.to_string())
    }

    /// Whether the IPFS API points at this machine.
    pub fn ipfs_api_is_local(&self) -> bool {
        let Some(api) = self.ipfs_api.as_deref() else {
            return false;
        };
        let rest = api.split_once("://").map(|(_, r)| r).unwrap_or(api);
        let host = rest.split(['/', ':']).next().unwrap_or_default();
        matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0" | "[::1]")
            || rest.starts_with("[::1]")
    }
}
