//! AWS S3 bucket provider using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BucketClient, BucketProvider, BucketState, raw_bucket_name};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::client::Waiters;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl,
    ObjectOwnership,
};
use bytes::Bytes;
use dshop_cloud::{AwsCredentials, AwsRegistry, aws_clients};
use dshop_core::resource::ResourceTag;
use dshop_core::{NetworkConfig, ResourceSelection, normalize_aws_bucket_name};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// How long to wait for a new bucket to become visible.
const BUCKET_EXISTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Map an SDK error, keeping the HTTP status when a response was received.
fn map_s3_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match err.raw_response().map(|raw| raw.status().as_u16()) {
        Some(status) => StorageError::Status {
            status,
            message: DisplayErrorContext(&err).to_string(),
        },
        None => StorageError::S3(Box::new(err)),
    }
}

/// S3 operations for one account and region.
pub struct S3BucketClient {
    client: Client,
    region: String,
    /// S3-compatible endpoint override; switches URLs to path style.
    endpoint: Option<String>,
}

impl std::fmt::Debug for S3BucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BucketClient")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3BucketClient {
    pub fn new(client: Client, region: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            client,
            region: region.into(),
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
        }
    }
}

#[async_trait]
impl BucketClient for S3BucketClient {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn bucket_state(&self, bucket: &str) -> StorageResult<BucketState> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(BucketState::Exists),
            Err(err) => {
                // No response at all (DNS, TLS, timeout) is unexpected and fatal.
                match err.raw_response().map(|raw| raw.status().as_u16()) {
                    Some(404) => Ok(BucketState::Missing),
                    Some(403) => Ok(BucketState::Forbidden),
                    Some(_) => Err(map_s3_error(err)),
                    None => Err(StorageError::S3(Box::new(err))),
                }
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3", region = %self.region))]
    async fn create_public_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(bucket)
            .object_ownership(ObjectOwnership::ObjectWriter);
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request.send().await.map_err(map_s3_error)?;

        self.client
            .wait_until_bucket_exists()
            .bucket(bucket)
            .wait(BUCKET_EXISTS_TIMEOUT)
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;

        // New buckets block public ACLs by default.
        self.client
            .delete_public_access_block()
            .bucket(bucket)
            .send()
            .await
            .map_err(map_s3_error)?;
        self.client
            .put_bucket_acl()
            .bucket(bucket)
            .acl(BucketCannedAcl::PublicRead)
            .send()
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("s3://{bucket}")
    }

    fn http_url(&self, bucket: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{endpoint}/{bucket}"),
            None => format!("https://{bucket}.s3.amazonaws.com"),
        }
    }
}

/// The `aws-files` bucket provider.
pub struct AwsBucketProvider {
    registry: Arc<AwsRegistry>,
    endpoint: Option<String>,
}

impl AwsBucketProvider {
    pub fn new(registry: Arc<AwsRegistry>) -> Self {
        Self {
            registry,
            endpoint: None,
        }
    }

    /// Target an S3-compatible endpoint instead of AWS.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl BucketProvider for AwsBucketProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn is_available(&self, config: &NetworkConfig, selection: &ResourceSelection) -> bool {
        selection.contains(ResourceTag::AwsFiles) && config.has_aws_credentials()
    }

    async fn configure(&self, config: &NetworkConfig) -> StorageResult<Arc<dyn BucketClient>> {
        let mut credentials = AwsCredentials::from_network_config(config)?;
        if let Some(endpoint) = &self.endpoint {
            credentials = credentials.with_endpoint(endpoint.clone());
        }
        let clients = aws_clients(&self.registry, &credentials).await;
        Ok(Arc::new(S3BucketClient::new(
            clients.s3(),
            credentials.region(),
            self.endpoint.clone(),
        )))
    }

    fn bucket_name(&self, network_name: &str, auth_token: &str) -> String {
        normalize_aws_bucket_name(&raw_bucket_name(network_name, auth_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dshop_core::resource::ResourceTag;

    fn provider() -> AwsBucketProvider {
        AwsBucketProvider::new(Arc::new(AwsRegistry::new()))
    }

    #[test]
    fn test_bucket_name() {
        assert_eq!(
            provider().bucket_name("Mainnet", "AbC_123"),
            "dshop-mainnet-abc-123"
        );
    }

    #[test]
    fn test_availability_requires_tag_and_credentials() {
        let config = NetworkConfig {
            aws_access_key_id: Some("AKIA".to_string()),
            aws_secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        let selected = ResourceSelection::new([ResourceTag::AwsFiles]);
        let p = provider();
        assert!(p.is_available(&config, &selected));
        assert!(!p.is_available(&config, &ResourceSelection::default()));
        assert!(!p.is_available(&NetworkConfig::default(), &selected));
    }
}
