//! Pinata pinner.

use crate::error::{IpfsError, IpfsResult};
use crate::pinner::{DirectoryUpload, Pinner, check_status};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Pinata's API endpoint.
pub const PINATA_API: &str = "https://api.pinata.cloud";

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash", default)]
    ipfs_hash: Option<String>,
}

/// Pins through Pinata's `pinFileToIPFS`, authenticated by API key/secret.
pub struct PinataPinner {
    http: reqwest::Client,
    api_url: String,
    key: String,
    secret: String,
}

impl PinataPinner {
    pub fn new(http: reqwest::Client, key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::with_api_url(http, PINATA_API, key, secret)
    }

    pub fn with_api_url(
        http: reqwest::Client,
        api_url: &str,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            key: key.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl Pinner for PinataPinner {
    fn name(&self) -> &'static str {
        "pinata"
    }

    fn identity(&self) -> String {
        "pinata".to_string()
    }

    #[instrument(skip(self, upload), fields(pinner = "pinata"))]
    async fn add_directory(&self, upload: &DirectoryUpload) -> IpfsResult<String> {
        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let response = self
            .http
            .post(&url)
            .header("pinata_api_key", &self.key)
            .header("pinata_secret_api_key", &self.secret)
            .multipart(upload.form("file", false)?)
            .send()
            .await?;
        let body: PinResponse = check_status(self.name(), response).await?.json().await?;
        let hash = body
            .ipfs_hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| IpfsError::MissingHash {
                pinner: self.name().to_string(),
            })?;
        debug!(hash = %hash, files = upload.files.len(), "Pinata pin complete");
        Ok(hash)
    }
}
