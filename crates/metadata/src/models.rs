//! Database models mapping to the metadata schema.

use crate::error::MetadataResult;
use dshop_core::{DeploymentStatus, Network, NetworkConfig, Shop};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Networks
// =============================================================================

/// Network record. `config_json` holds the decrypted `NetworkConfig`.
#[derive(Debug, Clone, FromRow)]
pub struct NetworkRow {
    pub network_id: i64,
    pub name: String,
    pub ipfs_gateway: Option<String>,
    pub ipfs_api: Option<String>,
    pub config_json: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl NetworkRow {
    pub fn from_network(network: &Network) -> MetadataResult<Self> {
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            network_id: network.network_id,
            name: network.name.clone(),
            ipfs_gateway: network.ipfs_gateway.clone(),
            ipfs_api: network.ipfs_api.clone(),
            config_json: serde_json::to_string(&network.config)?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn to_network(&self) -> MetadataResult<Network> {
        let config: NetworkConfig = serde_json::from_str(&self.config_json)?;
        Ok(Network {
            network_id: self.network_id,
            name: self.name.clone(),
            ipfs_gateway: self.ipfs_gateway.clone(),
            ipfs_api: self.ipfs_api.clone(),
            config,
        })
    }
}

// =============================================================================
// Shops
// =============================================================================

/// Shop record.
#[derive(Debug, Clone, FromRow)]
pub struct ShopRow {
    pub shop_id: i64,
    pub name: String,
    pub auth_token: String,
    pub network_id: i64,
    pub has_changes: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ShopRow {
    pub fn new(shop_id: i64, name: &str, auth_token: &str, network_id: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            shop_id,
            name: name.to_string(),
            auth_token: auth_token.to_string(),
            network_id,
            has_changes: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Shop {
            shop_id: row.shop_id,
            name: row.name,
            auth_token: row.auth_token,
            network_id: row.network_id,
            has_changes: row.has_changes,
        }
    }
}

// =============================================================================
// Deployments
// =============================================================================

/// One deployment attempt.
#[derive(Debug, Clone, FromRow)]
pub struct DeploymentRow {
    pub deployment_id: Uuid,
    pub shop_id: i64,
    pub status: String,
    pub error: Option<String>,
    pub domain: Option<String>,
    pub ipfs_hash: Option<String>,
    pub ipfs_pinner: Option<String>,
    pub ipfs_gateway: Option<String>,
    /// JSON array of provider URLs (`s3://`, `gs://`).
    pub bucket_urls: Option<String>,
    /// JSON array of public bucket HTTP URLs.
    pub bucket_http_urls: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl DeploymentRow {
    /// A fresh row in the given status.
    pub fn new(shop_id: i64, status: DeploymentStatus, error: Option<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            deployment_id: Uuid::new_v4(),
            shop_id,
            status: status.as_str().to_string(),
            error,
            domain: None,
            ipfs_hash: None,
            ipfs_pinner: None,
            ipfs_gateway: None,
            bucket_urls: None,
            bucket_http_urls: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> MetadataResult<DeploymentStatus> {
        Ok(self.status.parse()?)
    }

    pub fn bucket_urls(&self) -> MetadataResult<Vec<String>> {
        decode_list(self.bucket_urls.as_deref())
    }

    pub fn bucket_http_urls(&self) -> MetadataResult<Vec<String>> {
        decode_list(self.bucket_http_urls.as_deref())
    }

    /// Age at `now`.
    pub fn age(&self, now: OffsetDateTime) -> time::Duration {
        now - self.created_at
    }
}

fn decode_list(raw: Option<&str>) -> MetadataResult<Vec<String>> {
    match raw {
        Some(json) => Ok(serde_json::from_str(json)?),
        None => Ok(Vec::new()),
    }
}

/// Fields persisted with the terminal status transition.
#[derive(Debug, Clone, Default)]
pub struct DeploymentUpdate {
    pub error: Option<String>,
    pub domain: Option<String>,
    pub ipfs_hash: Option<String>,
    pub ipfs_pinner: Option<String>,
    pub ipfs_gateway: Option<String>,
    pub bucket_urls: Vec<String>,
    pub bucket_http_urls: Vec<String>,
}

impl DeploymentUpdate {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Deployment names
// =============================================================================

/// Hostname bound to an IPFS hash by a deployment.
#[derive(Debug, Clone, FromRow)]
pub struct DeploymentNameRow {
    pub id: Uuid,
    pub shop_id: i64,
    pub hostname: String,
    pub ipfs_hash: String,
    pub ipfs_pinner: Option<String>,
    pub ipfs_gateway: Option<String>,
    pub created_at: OffsetDateTime,
}

impl DeploymentNameRow {
    pub fn new(
        shop_id: i64,
        hostname: &str,
        ipfs_hash: &str,
        ipfs_pinner: Option<String>,
        ipfs_gateway: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shop_id,
            hostname: hostname.to_string(),
            ipfs_hash: ipfs_hash.to_string(),
            ipfs_pinner,
            ipfs_gateway,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
