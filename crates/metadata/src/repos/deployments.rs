//! Deployment repository.

use crate::error::MetadataResult;
use crate::models::{DeploymentRow, DeploymentUpdate};
use async_trait::async_trait;
use dshop_core::DeploymentStatus;
use uuid::Uuid;

/// Repository for deployment attempts.
#[async_trait]
pub trait DeploymentRepo: Send + Sync {
    /// Insert a deployment row.
    ///
    /// Inserting a second `pending` row for a shop fails with
    /// `MetadataError::Constraint`.
    async fn create_deployment(&self, deployment: &DeploymentRow) -> MetadataResult<()>;

    /// Get a deployment by ID.
    async fn get_deployment(&self, deployment_id: Uuid) -> MetadataResult<Option<DeploymentRow>>;

    /// The shop's pending deployment, if any.
    async fn get_pending_deployment(&self, shop_id: i64) -> MetadataResult<Option<DeploymentRow>>;

    /// Move a pending deployment to `status`, persisting `update`.
    ///
    /// Fails with `InvalidStateTransition` if the row is no longer pending.
    async fn finish_deployment(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
        update: &DeploymentUpdate,
    ) -> MetadataResult<()>;

    /// A shop's deployments, newest first.
    async fn list_deployments(&self, shop_id: i64, limit: u32)
    -> MetadataResult<Vec<DeploymentRow>>;

    /// The shop's most recent successful deployment.
    async fn latest_successful_deployment(
        &self,
        shop_id: i64,
    ) -> MetadataResult<Option<DeploymentRow>>;
}
