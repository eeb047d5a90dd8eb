//! Network repository.

use crate::error::MetadataResult;
use crate::models::NetworkRow;
use async_trait::async_trait;

/// Repository for network records.
#[async_trait]
pub trait NetworkRepo: Send + Sync {
    /// Insert a network or replace its name, endpoints and config.
    async fn upsert_network(&self, network: &NetworkRow) -> MetadataResult<()>;

    /// Get a network by ID.
    async fn get_network(&self, network_id: i64) -> MetadataResult<Option<NetworkRow>>;
}
