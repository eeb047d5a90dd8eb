//! Deployment name repository.

use crate::error::MetadataResult;
use crate::models::DeploymentNameRow;
use async_trait::async_trait;

/// Repository for hostname to IPFS hash bindings.
#[async_trait]
pub trait DeploymentNameRepo: Send + Sync {
    /// Find the binding for a hostname and hash.
    async fn find_deployment_name(
        &self,
        hostname: &str,
        ipfs_hash: &str,
    ) -> MetadataResult<Option<DeploymentNameRow>>;

    /// Insert a binding.
    async fn create_deployment_name(&self, name: &DeploymentNameRow) -> MetadataResult<()>;

    /// A shop's bindings, newest first.
    async fn list_deployment_names(&self, shop_id: i64) -> MetadataResult<Vec<DeploymentNameRow>>;
}
