use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use dshop_cloud::AwsRegistry;
use dshop_core::{NetworkConfig, ResourceSelection, resource::ResourceTag};
use dshop_storage::traits::{BucketClient, BucketProvider, BucketState};
use dshop_storage::{AwsBucketProvider, deploy_bucket};
use std::sync::Arc;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::{ContainerAsync, GenericImage, ImageExt, runners::AsyncRunner};

const MINIO_IMAGE: &str = "minio/minio";
const MINIO_TAG: &str = "RELEASE.2024-02-12T21-36-45Z";

fn should_skip_s3_tests() -> bool {
    std::env::var("SKIP_S3_TESTS").is_ok()
}

struct MinioContext {
    _container: ContainerAsync<GenericImage>,
    endpoint: String,
    access_key: String,
    secret_key: String,
}

impl MinioContext {
    async fn new() -> Result<Self, String> {
        let access_key = "minio-access-key".to_string();
        let secret_key = "minio-secret-key".to_string();

        let container: ContainerAsync<GenericImage> = GenericImage::new(MINIO_IMAGE, MINIO_TAG)
            .with_exposed_port(9000.tcp())
            .with_wait_for(WaitFor::message_on_stdout("API:"))
            .with_env_var("MINIO_ROOT_USER", access_key.clone())
            .with_env_var("MINIO_ROOT_PASSWORD", secret_key.clone())
            .with_cmd(vec!["server", "/data"])
            .start()
            .await
            .map_err(|e| format!("failed to start MinIO container: {e}"))?;

        let host = container
            .get_host()
            .await
            .map_err(|e| format!("failed to get host: {e}"))?;
        let port = container
            .get_host_port_ipv4(9000.tcp())
            .await
            .map_err(|e| format!("failed to get port: {e}"))?;

        Ok(Self {
            _container: container,
            endpoint: format!("http://{host}:{port}"),
            access_key,
            secret_key,
        })
    }

    /// A plain client for arranging and inspecting state.
    fn raw_client(&self) -> Client {
        let credentials = Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            None,
            None,
            "test",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(credentials)
            .http_client(aws_smithy_http_client::Builder::new().build_http())
            .endpoint_url(self.endpoint.clone())
            .force_path_style(true)
            .build();
        Client::from_conf(config)
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            aws_access_key_id: Some(self.access_key.clone()),
            aws_secret_access_key: Some(self.secret_key.clone()),
            aws_region: Some("us-east-1".to_string()),
            ..Default::default()
        }
    }
}

#[tokio::test]
async fn test_s3_provider_uploads_build_to_existing_bucket() {
    if should_skip_s3_tests() {
        return;
    }

    let context = match MinioContext::new().await {
        Ok(context) => context,
        Err(err) => {
            eprintln!("Skipping S3 test: {err}");
            return;
        }
    };

    let provider =
        AwsBucketProvider::new(Arc::new(AwsRegistry::new())).with_endpoint(&context.endpoint);
    let config = context.network_config();
    assert!(provider.is_available(&config, &ResourceSelection::new([ResourceTag::AwsFiles])));

    let bucket = provider.bucket_name("localhost", "token1");
    assert_eq!(bucket, "dshop-localhost-token1");

    let client = provider.configure(&config).await.unwrap();
    assert_eq!(
        client.bucket_state(&bucket).await.unwrap(),
        BucketState::Missing
    );

    let raw = context.raw_client();
    raw.create_bucket().bucket(&bucket).send().await.unwrap();
    assert_eq!(
        client.bucket_state(&bucket).await.unwrap(),
        BucketState::Exists
    );

    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("token1")).unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>shop</html>").unwrap();
    std::fs::write(dir.path().join("token1/config.json"), "{}").unwrap();

    let deployment = deploy_bucket(client.as_ref(), &bucket, dir.path(), 3)
        .await
        .unwrap();
    assert_eq!(deployment.url, "s3://dshop-localhost-token1");
    assert_eq!(
        deployment.http_url,
        format!("{}/dshop-localhost-token1", context.endpoint)
    );

    let object = raw
        .get_object()
        .bucket(&bucket)
        .key("token1/config.json")
        .send()
        .await
        .unwrap();
    assert_eq!(object.content_type(), Some("application/json"));
    let body = object.body.collect().await.unwrap().into_bytes();
    assert_eq!(&body[..], b"{}");
}
