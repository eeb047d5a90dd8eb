//! IPFS publication for Dshop builds.
//!
//! A build is pinned to every configured remote pinner (IPFS Cluster,
//! Pinata) at once, or to a local node on development networks, and the
//! resulting hash is primed through the public gateways.

pub mod error;
pub mod gateway;
pub mod multiaddr;
pub mod pinner;
pub mod pinners;

pub use error::{IpfsError, IpfsResult};
pub use gateway::prime_gateways;
pub use multiaddr::http_url_to_multiaddr;
pub use pinner::{DirectoryUpload, Pinner, UploadFile};
pub use pinners::{ClusterPinner, LocalNodePinner, PinataPinner};

use dshop_core::config::DeployConfig;
use dshop_core::{Network, ResourceSelection, ResourceTag};
use futures::future::try_join_all;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Gateway and endpoint settings for one publication.
#[derive(Debug, Clone)]
pub struct IpfsSettings {
    pub public_gateway: String,
    pub pinata_gateway: String,
    pub pinata_api: String,
    pub prime_concurrency: usize,
}

impl From<&DeployConfig> for IpfsSettings {
    fn from(config: &DeployConfig) -> Self {
        Self {
            public_gateway: config.public_ipfs_gateway.clone(),
            pinata_gateway: config.pinata_gateway.clone(),
            pinata_api: pinners::pinata::PINATA_API.to_string(),
            prime_concurrency: config.gateway_prime_concurrency,
        }
    }
}

/// What a publication records on the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpfsDeployment {
    pub ipfs_hash: String,
    /// Comma-separated pinner identities.
    pub ipfs_pinner: String,
    pub ipfs_gateway: Option<String>,
}

/// Remote pinners the job selected and the network has credentials for.
pub fn remote_pinners(
    http: &reqwest::Client,
    network: &Network,
    selection: &ResourceSelection,
    settings: &IpfsSettings,
) -> IpfsResult<Vec<Box<dyn Pinner>>> {
    let config = &network.config;
    let mut pinners: Vec<Box<dyn Pinner>> = Vec::new();
    if selection.contains(ResourceTag::IpfsCluster) && config.has_cluster_credentials() {
        match (
            network.ipfs_api.as_deref(),
            config.ipfs_cluster_user.as_deref(),
            config.ipfs_cluster_password.as_deref(),
        ) {
            (Some(api), Some(user), Some(password)) => {
                pinners.push(Box::new(ClusterPinner::new(http.clone(), api, user, password)?));
            }
            _ => warn!(
                network_id = network.network_id,
                "IPFS Cluster selected but network has no IPFS API"
            ),
        }
    }
    if selection.contains(ResourceTag::IpfsPinata)
        && config.has_pinata_credentials()
        && let (Some(key), Some(secret)) =
            (config.pinata_key.as_deref(), config.pinata_secret.as_deref())
    {
        pinners.push(Box::new(PinataPinner::with_api_url(
            http.clone(),
            &settings.pinata_api,
            key,
            secret,
        )));
    }
    Ok(pinners)
}

/// Publish `public_dir` to IPFS.
///
/// Fails with `PinnerNotConfigured` when no remote pinner is available and
/// the network's IPFS API is not on this machine.
#[instrument(skip_all, fields(network_id = network.network_id))]
pub async fn deploy_to_ipfs(
    http: &reqwest::Client,
    network: &Network,
    selection: &ResourceSelection,
    public_dir: &Path,
    settings: &IpfsSettings,
) -> IpfsResult<IpfsDeployment> {
    let pinners = remote_pinners(http, network, selection, settings)?;
    let upload = DirectoryUpload::read(public_dir).await?;

    if pinners.is_empty() {
        let api = network
            .ipfs_api
            .as_deref()
            .filter(|_| network.ipfs_api_is_local())
            .ok_or(IpfsError::PinnerNotConfigured)?;
        let local = LocalNodePinner::new(http.clone(), api);
        let ipfs_hash = local.add_directory(&upload).await?;
        info!(hash = %ipfs_hash, "Added build to local IPFS node");
        return Ok(IpfsDeployment {
            ipfs_hash,
            ipfs_pinner: local.identity(),
            ipfs_gateway: network.ipfs_gateway.clone(),
        });
    }

    let hashes = try_join_all(pinners.iter().map(|p| p.add_directory(&upload))).await?;
    let Some(ipfs_hash) = hashes.first().cloned() else {
        return Err(IpfsError::PinnerNotConfigured);
    };
    // Every pinner must report the same root.
    if let Some((pinner, hash)) = pinners
        .iter()
        .zip(&hashes)
        .find(|(_, hash)| **hash != ipfs_hash)
    {
        return Err(IpfsError::HashMismatch {
            pinner: pinner.name().to_string(),
            hash: hash.clone(),
            expected: ipfs_hash,
        });
    }
    let ipfs_pinner = pinners
        .iter()
        .map(|p| p.identity())
        .collect::<Vec<_>>()
        .join(",");
    info!(hash = %ipfs_hash, pinners = %ipfs_pinner, "Pinned build");

    let mut gateways = vec![settings.public_gateway.clone()];
    if pinners.iter().any(|p| p.name() == "pinata") {
        gateways.push(settings.pinata_gateway.clone());
    }
    if let Some(gateway) = &network.ipfs_gateway {
        gateways.push(gateway.clone());
    }
    gateways.sort();
    gateways.dedup();
    prime_gateways(http, &gateways, &ipfs_hash, upload.keys(), settings.prime_concurrency).await;

    Ok(IpfsDeployment {
        ipfs_hash,
        ipfs_pinner,
        ipfs_gateway: network.ipfs_gateway.clone(),
    })
}
