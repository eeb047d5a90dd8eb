//! Local IPFS node pinner over the Kubo RPC API.

use crate::error::IpfsResult;
use crate::pinner::{DirectoryUpload, Pinner, check_status, root_hash};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Adds content to a node reachable on this machine (development networks).
pub struct LocalNodePinner {
    http: reqwest::Client,
    api_url: String,
}

impl LocalNodePinner {
    pub fn new(http: reqwest::Client, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Pinner for LocalNodePinner {
    fn name(&self) -> &'static str {
        "local"
    }

    fn identity(&self) -> String {
        self.api_url.clone()
    }

    #[instrument(skip(self, upload), fields(pinner = "local", api = %self.api_url))]
    async fn add_directory(&self, upload: &DirectoryUpload) -> IpfsResult<String> {
        let url = format!("{}/api/v0/add?recursive=true&pin=true", self.api_url);
        let response = self
            .http
            .post(&url)
            .multipart(upload.form("file", true)?)
            .send()
            .await?;
        let body = check_status(self.name(), response).await?.text().await?;
        let hash = root_hash(self.name(), &body, &upload.root)?;
        debug!(hash = %hash, files = upload.files.len(), "Local add complete");
        Ok(hash)
    }
}
