//! IPFS Cluster pinner over the cluster REST API.

use crate::error::IpfsResult;
use crate::multiaddr::http_url_to_multiaddr;
use crate::pinner::{DirectoryUpload, Pinner, check_status, root_hash};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Pins through an IPFS Cluster `/add` endpoint with basic auth.
pub struct ClusterPinner {
    http: reqwest::Client,
    api_url: String,
    multiaddr: String,
    user: String,
    password: String,
}

impl ClusterPinner {
    pub fn new(
        http: reqwest::Client,
        api_url: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> IpfsResult<Self> {
        Ok(Self {
            http,
            multiaddr: http_url_to_multiaddr(api_url)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
        })
    }
}

#[async_trait]
impl Pinner for ClusterPinner {
    fn name(&self) -> &'static str {
        "ipfs-cluster"
    }

    fn identity(&self) -> String {
        self.multiaddr.clone()
    }

    #[instrument(skip(self, upload), fields(pinner = "ipfs-cluster", multiaddr = %self.multiaddr))]
    async fn add_directory(&self, upload: &DirectoryUpload) -> IpfsResult<String> {
        let url = format!("{}/add?recursive=true&local=false", self.api_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .multipart(upload.form("file", true)?)
            .send()
            .await?;
        let body = check_status(self.name(), response).await?.text().await?;
        let hash = root_hash(self.name(), &body, &upload.root)?;
        debug!(hash = %hash, files = upload.files.len(), "Cluster add complete");
        Ok(hash)
    }
}
