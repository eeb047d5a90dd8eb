//! Google Cloud Storage bucket provider over the JSON API.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BucketClient, BucketProvider, BucketState, raw_bucket_name};
use async_trait::async_trait;
use bytes::Bytes;
use dshop_cloud::gcp::encode_component;
use dshop_cloud::{CloudError, GcpClient, GcpRegistry, gcp_client};
use dshop_core::config::GcpConfig;
use dshop_core::resource::ResourceTag;
use dshop_core::{NetworkConfig, ResourceSelection, normalize_gcp_bucket_name};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::instrument;

const PUBLIC_STORAGE_URL: &str = "https://storage.googleapis.com";

fn map_cloud_error(err: CloudError) -> StorageError {
    match err {
        CloudError::Status { status, message } => StorageError::Status { status, message },
        other => StorageError::Cloud(other),
    }
}

/// GCS operations for one project.
#[derive(Debug)]
pub struct GcsBucketClient {
    client: Arc<GcpClient>,
}

impl GcsBucketClient {
    pub fn new(client: Arc<GcpClient>) -> Self {
        Self { client }
    }

    async fn grant_public_read(&self, bucket: &str) -> StorageResult<()> {
        let entry = json!({"entity": "allUsers", "role": "READER"});
        let bucket = encode_component(bucket);
        let _: Value = self
            .client
            .post(&self.client.storage_url(&format!("b/{bucket}/acl")), &entry)
            .await
            .map_err(map_cloud_error)?;
        let _: Value = self
            .client
            .post(
                &self.client.storage_url(&format!("b/{bucket}/defaultObjectAcl")),
                &entry,
            )
            .await
            .map_err(map_cloud_error)?;
        Ok(())
    }
}

#[async_trait]
impl BucketClient for GcsBucketClient {
    fn backend_name(&self) -> &'static str {
        "gcs"
    }

    #[instrument(skip(self), fields(backend = "gcs"))]
    async fn bucket_state(&self, bucket: &str) -> StorageResult<BucketState> {
        let url = self
            .client
            .storage_url(&format!("b/{}", encode_component(bucket)));
        match self.client.get::<Value>(&url).await {
            Ok(_) => Ok(BucketState::Exists),
            Err(e) if e.status() == Some(404) => Ok(BucketState::Missing),
            Err(e) if e.status() == Some(403) => Ok(BucketState::Forbidden),
            Err(e) => Err(map_cloud_error(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "gcs"))]
    async fn create_public_bucket(&self, bucket: &str) -> StorageResult<()> {
        let url = format!(
            "{}?project={}&predefinedAcl=publicRead&predefinedDefaultObjectAcl=publicRead",
            self.client.storage_url("b"),
            encode_component(self.client.project_id())
        );
        let body = json!({
            "name": bucket,
            "website": {
                "mainPageSuffix": "index.html",
                "notFoundPage": "index.html"
            }
        });
        let _: Value = self
            .client
            .post(&url, &body)
            .await
            .map_err(map_cloud_error)?;

        // The predefined ACL on creation does not reliably make objects public.
        self.grant_public_read(bucket).await
    }

    #[instrument(skip(self, data), fields(backend = "gcs", size = data.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let url = self.client.storage_upload_url(bucket, key);
        self.client
            .upload(&url, data.to_vec(), content_type)
            .await
            .map_err(map_cloud_error)
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("gs://{bucket}")
    }

    fn http_url(&self, bucket: &str) -> String {
        format!("{PUBLIC_STORAGE_URL}/{bucket}")
    }
}

/// The `gcp-files` bucket provider.
pub struct GcpBucketProvider {
    registry: Arc<GcpRegistry>,
    config: GcpConfig,
}

impl GcpBucketProvider {
    pub fn new(registry: Arc<GcpRegistry>, config: GcpConfig) -> Self {
        Self { registry, config }
    }
}

#[async_trait]
impl BucketProvider for GcpBucketProvider {
    fn name(&self) -> &'static str {
        "gcp"
    }

    fn is_available(&self, config: &NetworkConfig, selection: &ResourceSelection) -> bool {
        selection.contains(ResourceTag::GcpFiles) && config.has_gcp_credentials()
    }

    async fn configure(&self, config: &NetworkConfig) -> StorageResult<Arc<dyn BucketClient>> {
        let credentials = config
            .gcp_credentials
            .as_deref()
            .ok_or_else(|| StorageError::Config("gcpCredentials not set".to_string()))?;
        let client = gcp_client(&self.registry, credentials, &self.config).await?;
        Ok(Arc::new(GcsBucketClient::new(client)))
    }

    fn bucket_name(&self, network_name: &str, auth_token: &str) -> String {
        normalize_gcp_bucket_name(&raw_bucket_name(network_name, auth_token))
    }
}
