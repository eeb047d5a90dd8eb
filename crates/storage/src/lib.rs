//! Bucket providers and the bucket orchestrator for Dshop.
//!
//! This crate provides:
//! - The `BucketProvider` contract and its S3 and GCS implementations
//! - Recursive upload with retry on HTTP 502
//! - `deploy_to_buckets`, which runs every available provider in order

pub mod backends;
pub mod error;
pub mod traits;
pub mod upload;

pub use backends::{gcs::GcpBucketProvider, s3::AwsBucketProvider};
pub use error::{StorageError, StorageResult};
pub use traits::{BucketClient, BucketDeployRequest, BucketProvider, BucketState};
pub use upload::{deploy_bucket, upload_dir, upload_file};

use dshop_cloud::CloudClients;
use dshop_core::config::GcpConfig;
use dshop_core::{BucketDeployment, ResourceSelection};
use std::sync::Arc;
use tracing::{debug, info};

/// Compile-time provider list, sorted by provider name.
pub fn default_bucket_providers(
    clients: &CloudClients,
    gcp_config: &GcpConfig,
) -> Vec<Arc<dyn BucketProvider>> {
    let mut providers: Vec<Arc<dyn BucketProvider>> = vec![
        Arc::new(AwsBucketProvider::new(Arc::clone(&clients.aws))),
        Arc::new(GcpBucketProvider::new(
            Arc::clone(&clients.gcp),
            gcp_config.clone(),
        )),
    ];
    providers.sort_by_key(|p| p.name());
    providers
}

/// Deploy the build to every available provider, sequentially.
///
/// The first failure aborts the loop; buckets already written by earlier
/// providers are left in place.
pub async fn deploy_to_buckets(
    providers: &[Arc<dyn BucketProvider>],
    selection: &ResourceSelection,
    request: &BucketDeployRequest<'_>,
) -> StorageResult<Vec<BucketDeployment>> {
    let mut deployments = Vec::new();
    for provider in providers {
        if !provider.is_available(&request.network.config, selection) {
            debug!(provider = provider.name(), "Bucket provider not available");
            continue;
        }
        let client = provider.configure(&request.network.config).await?;
        let deployment = provider.deploy(client.as_ref(), request).await?;
        info!(
            provider = provider.name(),
            bucket = %deployment.bucket_name,
            url = %deployment.url,
            "Deployed to bucket"
        );
        deployments.push(deployment);
    }
    Ok(deployments)
}
