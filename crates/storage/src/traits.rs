//! Bucket provider and bucket client traits.

use crate::error::StorageResult;
use crate::upload::deploy_bucket;
use async_trait::async_trait;
use bytes::Bytes;
use dshop_core::{BucketDeployment, Network, NetworkConfig, ResourceSelection, Shop};
use std::path::Path;
use std::sync::Arc;

/// Result of probing for a bucket by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// We own it and can write to it.
    Exists,
    /// No bucket by that name.
    Missing,
    /// A bucket by that name exists but denies us.
    Forbidden,
}

/// Object storage operations a bucket provider needs, for one account.
#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Short provider identifier for logs (`s3`, `gcs`).
    fn backend_name(&self) -> &'static str;

    /// Probe a bucket by name.
    async fn bucket_state(&self, bucket: &str) -> StorageResult<BucketState>;

    /// Create a publicly readable bucket and wait until it is usable.
    async fn create_public_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Write one publicly readable object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Provider URL of a bucket, e.g. `s3://name`.
    fn bucket_url(&self, bucket: &str) -> String;

    /// Public HTTP URL of a bucket.
    fn http_url(&self, bucket: &str) -> String;
}

/// Everything a bucket deploy needs to know about the shop and build.
#[derive(Debug, Clone, Copy)]
pub struct BucketDeployRequest<'a> {
    pub network: &'a Network,
    pub shop: &'a Shop,
    /// `{OutputDir}/public`.
    pub public_dir: &'a Path,
    pub upload_max_retries: u32,
}

/// A pluggable bucket provider.
#[async_trait]
pub trait BucketProvider: Send + Sync {
    /// Provider name; the orchestrator runs providers sorted by it.
    fn name(&self) -> &'static str;

    /// Whether the job selected this provider and the network configured it.
    fn is_available(&self, config: &NetworkConfig, selection: &ResourceSelection) -> bool;

    /// Resolve the client for the network's credentials.
    async fn configure(&self, config: &NetworkConfig) -> StorageResult<Arc<dyn BucketClient>>;

    /// Provider-normalized bucket name for a shop.
    fn bucket_name(&self, network_name: &str, auth_token: &str) -> String;

    /// Create the bucket if needed and upload the build.
    async fn deploy(
        &self,
        client: &dyn BucketClient,
        request: &BucketDeployRequest<'_>,
    ) -> StorageResult<BucketDeployment> {
        let bucket = self.bucket_name(&request.network.name, &request.shop.auth_token);
        deploy_bucket(
            client,
            &bucket,
            request.public_dir,
            request.upload_max_retries,
        )
        .await
    }
}

/// Raw bucket name before provider normalization: `dshop-{network}-{token}`.
pub fn raw_bucket_name(network_name: &str, auth_token: &str) -> String {
    format!(
        "{}-{}-{}",
        dshop_core::RESOURCE_PREFIX,
        network_name,
        auth_token
    )
}
