//! AWS SDK client construction from a network's credentials.

use crate::error::{CloudError, CloudResult};
use crate::registry::{ClientRegistry, CredentialFingerprint, secret_digest};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use dshop_core::NetworkConfig;
use std::sync::Arc;

/// ACM certificates used by CloudFront must live in this region.
pub const CLOUDFRONT_CERT_REGION: &str = "us-east-1";

/// Credentials and endpoint for one AWS account.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    region: String,
    /// S3-compatible endpoint override (MinIO in tests).
    endpoint: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AwsCredentials {
    /// Explicit credentials from the network config.
    ///
    /// Fails if only one half of the key pair is set.
    pub fn from_network_config(config: &NetworkConfig) -> CloudResult<Self> {
        let key = config.aws_access_key_id.clone().filter(|k| !k.is_empty());
        let secret = config
            .aws_secret_access_key
            .clone()
            .filter(|s| !s.is_empty());
        if key.is_some() ^ secret.is_some() {
            return Err(CloudError::InvalidCredentials(
                "awsAccessKeyId and awsSecretAccessKey must be set together".to_string(),
            ));
        }
        Ok(Self {
            access_key_id: key,
            secret_access_key: secret,
            region: config.aws_region().to_string(),
            endpoint: None,
        })
    }

    /// Ambient credentials (instance role, environment, profile).
    pub fn ambient(region: impl Into<String>) -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: region.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_explicit(&self) -> bool {
        self.access_key_id.is_some()
    }

    pub fn fingerprint(&self) -> CredentialFingerprint {
        let secret = self
            .secret_access_key
            .as_deref()
            .map(secret_digest)
            .unwrap_or_default();
        CredentialFingerprint::new(
            "aws",
            &[
                self.access_key_id.as_deref().unwrap_or("ambient"),
                &secret,
                &self.region,
                self.endpoint.as_deref().unwrap_or_default(),
            ],
        )
    }

    async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));
        if let (Some(key_id), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            let credentials = Credentials::new(
                key_id.clone(),
                secret.clone(),
                None, // session token
                None, // expiration
                "dshop-network-config",
            );
            loader = loader.credentials_provider(credentials);
        }
        loader.load().await
    }
}

/// Shared SDK configuration plus per-service client constructors.
pub struct AwsClients {
    config: SdkConfig,
    endpoint: Option<String>,
}

impl AwsClients {
    pub async fn new(credentials: &AwsCredentials) -> Self {
        let endpoint = credentials.endpoint.as_ref().map(|endpoint_url| {
            let lower = endpoint_url.to_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint_url.clone()
            } else {
                format!("http://{endpoint_url}")
            }
        });
        Self {
            config: credentials.load().await,
            endpoint,
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.config.region().map(|r| r.as_ref())
    }

    pub fn s3(&self) -> aws_sdk_s3::Client {
        let mut builder = aws_sdk_s3::config::Builder::from(&self.config);
        if let Some(endpoint_url) = &self.endpoint {
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
            // Plain-HTTP endpoints (local MinIO) do not need a TLS stack.
            if endpoint_url.to_ascii_lowercase().starts_with("http://") {
                builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }

    pub fn cloudfront(&self) -> aws_sdk_cloudfront::Client {
        aws_sdk_cloudfront::Client::new(&self.config)
    }

    /// ACM client pinned to the region CloudFront reads certificates from.
    pub fn acm(&self) -> aws_sdk_acm::Client {
        let config = aws_sdk_acm::config::Builder::from(&self.config)
            .region(Region::new(CLOUDFRONT_CERT_REGION))
            .build();
        aws_sdk_acm::Client::from_conf(config)
    }

    pub fn route53(&self) -> aws_sdk_route53::Client {
        aws_sdk_route53::Client::new(&self.config)
    }
}

/// Process-wide AWS client registry.
pub type AwsRegistry = ClientRegistry<AwsClients>;

/// Resolve (or build) the clients for `credentials`.
pub async fn aws_clients(
    registry: &AwsRegistry,
    credentials: &AwsCredentials,
) -> Arc<AwsClients> {
    let fingerprint = credentials.fingerprint();
    let result: Result<_, std::convert::Infallible> = registry
        .get_or_try_init(&fingerprint, || async {
            tracing::debug!(
                region = %credentials.region(),
                explicit = credentials.is_explicit(),
                "Configuring AWS clients"
            );
            Ok(AwsClients::new(credentials).await)
        })
        .await;
    let Ok(clients) = result;
    clients
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_credentials_rejected() {
        let config = NetworkConfig {
            aws_access_key_id: Some("AKIA".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            AwsCredentials::from_network_config(&config),
            Err(CloudError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn test_fingerprint_distinguishes_accounts_and_regions() {
        let config = NetworkConfig {
            aws_access_key_id: Some("AKIA1".to_string()),
            aws_secret_access_key: Some("secret".to_string()),
            aws_region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        let a = AwsCredentials::from_network_config(&config).unwrap();
        let b = AwsCredentials::ambient("eu-west-1");
        let c = AwsCredentials::ambient("us-east-1");
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(b.fingerprint(), c.fingerprint());
        assert!(a.is_explicit());
        assert_eq!(a.region(), "eu-west-1");
    }

    #[test]
    fn test_fingerprint_follows_rotated_secret() {
        let config = |secret: &str| NetworkConfig {
            aws_access_key_id: Some("AKIA1".to_string()),
            aws_secret_access_key: Some(secret.to_string()),
            ..Default::default()
        };
        let wrong = AwsCredentials::from_network_config(&config("wrong")).unwrap();
        let fixed = AwsCredentials::from_network_config(&config("fixed")).unwrap();
        let again = AwsCredentials::from_network_config(&config("fixed")).unwrap();
        assert_ne!(wrong.fingerprint(), fixed.fingerprint());
        assert_eq!(fixed.fingerprint(), again.fingerprint());
    }

    #[test]
    fn test_debug_omits_secret() {
        let config = NetworkConfig {
            aws_access_key_id: Some("AKIA1".to_string()),
            aws_secret_access_key: Some("very-secret".to_string()),
            ..Default::default()
        };
        let creds = AwsCredentials::from_network_config(&config).unwrap();
        assert!(!format!("{creds:?}").contains("very-secret"));
    }
}
