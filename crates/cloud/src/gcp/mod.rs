//! Google Cloud REST client: Storage JSON API, Compute Engine and Cloud DNS.

pub mod auth;
pub mod operation;

pub use auth::{ServiceAccountKey, TokenSource};
pub use operation::Operation;

use crate::error::{CloudError, CloudResult};
use crate::registry::{ClientRegistry, CredentialFingerprint, secret_digest};
use dshop_core::config::GcpConfig;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::RequestBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
const COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com";
const DNS_ENDPOINT: &str = "https://dns.googleapis.com";

/// Base URLs for the APIs the pipeline calls.
#[derive(Debug, Clone)]
pub struct GcpEndpoints {
    pub storage: String,
    pub compute: String,
    pub dns: String,
}

impl GcpEndpoints {
    pub fn from_config(config: &GcpConfig) -> Self {
        let pick = |value: &Option<String>, default: &str| {
            value
                .as_deref()
                .unwrap_or(default)
                .trim_end_matches('/')
                .to_string()
        };
        Self {
            storage: pick(&config.storage_endpoint, STORAGE_ENDPOINT),
            compute: pick(&config.compute_endpoint, COMPUTE_ENDPOINT),
            dns: pick(&config.dns_endpoint, DNS_ENDPOINT),
        }
    }

    /// Every API served from one base URL (mock servers).
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            storage: base.clone(),
            compute: base.clone(),
            dns: base,
        }
    }
}

/// Everything but RFC 3986 unreserved characters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode one URL path or query component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Authenticated client for one GCP project.
pub struct GcpClient {
    http: reqwest::Client,
    project_id: String,
    client_email: String,
    token: TokenSource,
    endpoints: GcpEndpoints,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl std::fmt::Debug for GcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpClient")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl GcpClient {
    /// Build a client from a service account key.
    pub fn from_service_account(key: ServiceAccountKey, config: &GcpConfig) -> Self {
        let http = reqwest::Client::new();
        Self {
            project_id: key.project_id.clone(),
            client_email: key.client_email.clone(),
            token: TokenSource::service_account(key, http.clone()),
            http,
            endpoints: GcpEndpoints::from_config(config),
            poll_interval: config.operation_poll_interval(),
            poll_max_attempts: config.operation_poll_max_attempts,
        }
    }

    /// Build a client with a fixed bearer token.
    pub fn with_token(
        project_id: impl Into<String>,
        token: impl Into<String>,
        endpoints: GcpEndpoints,
        config: &GcpConfig,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id: project_id.into(),
            client_email: String::new(),
            token: TokenSource::fixed(token),
            endpoints,
            poll_interval: config.operation_poll_interval(),
            poll_max_attempts: config.operation_poll_max_attempts,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn endpoints(&self) -> &GcpEndpoints {
        &self.endpoints
    }

    /// `.../storage/v1/{path}`
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.endpoints.storage, path)
    }

    /// Media upload URL for one object.
    pub fn storage_upload_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoints.storage,
            encode_component(bucket),
            encode_component(object)
        )
    }

    /// `.../compute/v1/projects/{project}/global/{path}`
    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/global/{}",
            self.endpoints.compute, self.project_id, path
        )
    }

    /// `.../dns/v1/projects/{project}/{path}`
    pub fn dns_url(&self, path: &str) -> String {
        format!(
            "{}/dns/v1/projects/{}/{}",
            self.endpoints.dns, self.project_id, path
        )
    }

    /// Self link of a global compute resource, as other resources reference it.
    pub fn compute_link(&self, collection: &str, name: &str) -> String {
        self.compute_url(&format!("{collection}/{name}"))
    }

    async fn send(&self, req: RequestBuilder) -> CloudResult<String> {
        let token = self.token.token().await?;
        let response = req.bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CloudError::Status {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> CloudResult<T> {
        let body = self.send(req).await?;
        let body = if body.trim().is_empty() { "{}" } else { &body };
        Ok(serde_json::from_str(body)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> CloudResult<T> {
        self.send_json(self.http.get(url)).await
    }

    /// GET that maps 404 to `None`.
    pub async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> CloudResult<Option<T>> {
        match self.get(url).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> CloudResult<T> {
        self.send_json(self.http.post(url).json(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> CloudResult<T> {
        self.send_json(self.http.patch(url).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> CloudResult<T> {
        self.send_json(self.http.delete(url)).await
    }

    /// Upload raw bytes with an explicit content type.
    pub async fn upload(&self, url: &str, data: Vec<u8>, content_type: &str) -> CloudResult<()> {
        let req = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        self.send(req).await.map(|_| ())
    }

    /// POST a compute resource and wait for the resulting operation.
    pub async fn compute_insert<B: Serialize + ?Sized>(
        &self,
        collection: &str,
        body: &B,
    ) -> CloudResult<Operation> {
        let operation: Operation = self.post(&self.compute_url(collection), body).await?;
        self.wait_for_operation(operation).await
    }

    /// DELETE a compute resource and wait for the resulting operation.
    pub async fn compute_delete(&self, collection: &str, name: &str) -> CloudResult<Operation> {
        let operation: Operation = self
            .delete(&self.compute_url(&format!("{collection}/{name}")))
            .await?;
        self.wait_for_operation(operation).await
    }

    /// Poll a global operation until it is `DONE`.
    ///
    /// Fails with `OperationTimeout` after the configured number of polls.
    #[instrument(skip(self, operation), fields(operation = %operation.name))]
    pub async fn wait_for_operation(&self, operation: Operation) -> CloudResult<Operation> {
        if operation.is_done() {
            return finished(operation);
        }
        let url = self.compute_url(&format!("operations/{}", operation.name));
        for attempt in 1..=self.poll_max_attempts {
            tokio::time::sleep(self.poll_interval).await;
            let polled: Operation = self.get(&url).await?;
            debug!(attempt, status = ?polled.status, "Polled operation");
            if polled.is_done() {
                return finished(polled);
            }
        }
        Err(CloudError::OperationTimeout {
            operation: operation.name,
            attempts: self.poll_max_attempts,
        })
    }
}

fn finished(operation: Operation) -> CloudResult<Operation> {
    match operation.error_message() {
        Some(message) => Err(CloudError::OperationFailed {
            operation: operation.name,
            message,
        }),
        None => Ok(operation),
    }
}

/// Process-wide GCP client registry.
pub type GcpRegistry = ClientRegistry<GcpClient>;

/// Resolve (or build) the client for a network's `gcpCredentials` JSON.
pub async fn gcp_client(
    registry: &GcpRegistry,
    credentials_json: &str,
    config: &GcpConfig,
) -> CloudResult<Arc<GcpClient>> {
    let key = ServiceAccountKey::from_json(credentials_json)?;
    let fingerprint = CredentialFingerprint::new(
        "gcp",
        &[
            &key.client_email,
            &key.project_id,
            key.private_key_id.as_deref().unwrap_or_default(),
            &secret_digest(&key.private_key),
        ],
    );
    registry
        .get_or_try_init(&fingerprint, || async {
            debug!(project = %key.project_id, "Configuring GCP client");
            Ok(GcpClient::from_service_account(key.clone(), config))
        })
        .await
}
