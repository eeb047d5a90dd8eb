//! Deployment lock and terminal status transitions.
//!
//! A shop has at most one `pending` deployment. The check for an existing
//! pending row is backed by the store's partial unique index, so two callers
//! racing past the check still cannot both insert.

use crate::error::{DeployError, DeployResult};
use dshop_core::DeploymentStatus;
use dshop_metadata::{DeploymentRow, DeploymentUpdate, MetadataError, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Error recorded on a pending deployment reaped by a later lock.
pub const EXPIRED_MESSAGE: &str = "Expired";

/// Error recorded on the row documenting a lock conflict.
pub const DUPLICATE_MESSAGE: &str = "Deployment already in progress";

/// Deployment lock and records over the metadata store.
#[derive(Clone)]
pub struct DeploymentRecords {
    metadata: Arc<dyn MetadataStore>,
    stale_after: time::Duration,
}

impl DeploymentRecords {
    pub fn new(metadata: Arc<dyn MetadataStore>, stale_after: time::Duration) -> Self {
        Self {
            metadata,
            stale_after,
        }
    }

    /// Take the shop's deployment lock, returning the new pending row.
    ///
    /// A pending row older than the stale threshold is marked failed with
    /// `Expired` and the lock proceeds. A younger one is a conflict: a failed
    /// row documenting it is recorded and `DuplicateDeployment` returned.
    #[instrument(skip(self))]
    pub async fn deployment_lock(&self, shop_id: i64) -> DeployResult<DeploymentRow> {
        if let Some(pending) = self.metadata.get_pending_deployment(shop_id).await? {
            let age = pending.age(OffsetDateTime::now_utc());
            if age <= self.stale_after {
                return Err(self.record_conflict(shop_id).await);
            }
            warn!(
                deployment_id = %pending.deployment_id,
                age_secs = age.whole_seconds(),
                "Expiring stale pending deployment"
            );
            match self
                .metadata
                .finish_deployment(
                    pending.deployment_id,
                    DeploymentStatus::Failure,
                    &DeploymentUpdate::error(EXPIRED_MESSAGE),
                )
                .await
            {
                // Finished by its own run in the meantime.
                Ok(()) | Err(MetadataError::InvalidStateTransition { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let deployment = DeploymentRow::new(shop_id, DeploymentStatus::Pending, None);
        match self.metadata.create_deployment(&deployment).await {
            Ok(()) => {
                info!(deployment_id = %deployment.deployment_id, "Acquired deployment lock");
                Ok(deployment)
            }
            Err(MetadataError::Constraint(_)) => Err(self.record_conflict(shop_id).await),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_conflict(&self, shop_id: i64) -> DeployError {
        let conflict = DeploymentRow::new(
            shop_id,
            DeploymentStatus::Failure,
            Some(DUPLICATE_MESSAGE.to_string()),
        );
        if let Err(e) = self.metadata.create_deployment(&conflict).await {
            warn!(error = %e, "Failed to record deployment conflict");
        }
        warn!("Deployment already in progress");
        DeployError::DuplicateDeployment { shop_id }
    }

    /// Mark a pending deployment successful, persisting `update`.
    #[instrument(skip(self, update))]
    pub async fn pass_deployment(
        &self,
        deployment_id: Uuid,
        update: &DeploymentUpdate,
    ) -> DeployResult<()> {
        self.metadata
            .finish_deployment(deployment_id, DeploymentStatus::Success, update)
            .await?;
        Ok(())
    }

    /// Mark a pending deployment failed with `message`.
    #[instrument(skip(self, message))]
    pub async fn fail_deployment(
        &self,
        deployment_id: Uuid,
        message: impl Into<String>,
    ) -> DeployResult<()> {
        self.metadata
            .finish_deployment(
                deployment_id,
                DeploymentStatus::Failure,
                &DeploymentUpdate::error(message),
            )
            .await?;
        Ok(())
    }
}
