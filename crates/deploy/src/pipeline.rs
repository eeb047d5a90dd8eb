//! Top-level deploy orchestration.

use crate::autossl::{autossl_url, prime_autossl};
use crate::build::BuildAssembler;
use crate::error::{DeployError, DeployResult, Stage};
use crate::job::DeployJob;
use crate::records::DeploymentRecords;
use dshop_cdn::{CdnProvider, default_cdn_providers};
use dshop_cloud::CloudClients;
use dshop_core::config::AppConfig;
use dshop_core::{BucketDeployment, DeployOutcome, Network, ResourceSelection, Shop, ShopPaths};
use dshop_dns::{DnsProvider, DnsRequest, configure_shop_dns, default_dns_providers};
use dshop_ipfs::{IpfsDeployment, IpfsSettings, deploy_to_ipfs};
use dshop_metadata::{DeploymentNameRow, DeploymentUpdate, MetadataStore};
use dshop_storage::{BucketDeployRequest, BucketProvider, default_bucket_providers, deploy_to_buckets};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Everything a successful run produced.
struct Deployed {
    buckets: Vec<BucketDeployment>,
    ipfs: IpfsDeployment,
    domain: Option<String>,
}

/// Runs deploy jobs against the configured providers.
pub struct Deployer {
    pub(crate) config: AppConfig,
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) http: reqwest::Client,
    pub(crate) records: DeploymentRecords,
    pub(crate) assembler: BuildAssembler,
    pub(crate) bucket_providers: Vec<Arc<dyn BucketProvider>>,
    pub(crate) cdn_providers: Vec<Arc<dyn CdnProvider>>,
    pub(crate) dns_providers: Vec<Arc<dyn DnsProvider>>,
    /// AutoSSL priming still running after its deploy returned.
    background: Mutex<JoinSet<()>>,
}

impl Deployer {
    /// A deployer over the compile-time provider lists.
    pub fn new(config: AppConfig, metadata: Arc<dyn MetadataStore>) -> Self {
        let clients = CloudClients::new();
        let bucket_providers = default_bucket_providers(&clients, &config.gcp);
        let cdn_providers = default_cdn_providers(&clients, &config.gcp);
        let dns_providers = default_dns_providers(&clients, &config.gcp);
        Self::with_providers(
            config,
            metadata,
            reqwest::Client::new(),
            bucket_providers,
            cdn_providers,
            dns_providers,
        )
    }

    /// A deployer over explicit provider lists.
    pub fn with_providers(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        http: reqwest::Client,
        bucket_providers: Vec<Arc<dyn BucketProvider>>,
        cdn_providers: Vec<Arc<dyn CdnProvider>>,
        dns_providers: Vec<Arc<dyn DnsProvider>>,
    ) -> Self {
        let records = DeploymentRecords::new(
            Arc::clone(&metadata),
            config.deploy.lock_stale_after(),
        );
        let assembler = BuildAssembler::from_config(&config);
        Self {
            config,
            metadata,
            http,
            records,
            assembler,
            bucket_providers,
            cdn_providers,
            dns_providers,
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn records(&self) -> &DeploymentRecords {
        &self.records
    }

    /// Wait for background work spawned by earlier deploys (AutoSSL
    /// priming). Returns how many tasks were joined.
    ///
    /// Callers that exit after a deploy must await this, or the runtime
    /// drops the tasks on shutdown.
    pub async fn wait_background(&self) -> usize {
        let mut tasks = std::mem::take(&mut *self.background.lock().await);
        let mut joined = 0;
        while let Some(result) = tasks.join_next().await {
            joined += 1;
            if let Err(e) = result {
                warn!(error = %e, "Background task did not complete");
            }
        }
        joined
    }

    /// Run one deploy job.
    ///
    /// Never fails: errors are recorded on the deployment row, logged, and
    /// returned as a stable error code.
    pub async fn deploy(&self, job: &DeployJob) -> DeployOutcome {
        let span = info_span!("deploy", shop_id = job.shop_id, network_id = job.network_id, job = %job.uuid);
        match self.run(job).instrument(span).await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    DeployError::DuplicateDeployment { .. } => {
                        warn!(shop_id = job.shop_id, "Deployment rejected: already in progress")
                    }
                    _ => error!(
                        shop_id = job.shop_id,
                        stage = err.failed_stage().map(|s| s.as_str()),
                        error = %err,
                        "Deployment failed"
                    ),
                }
                DeployOutcome::failure(err.error_code())
            }
        }
    }

    async fn run(&self, job: &DeployJob) -> DeployResult<DeployOutcome> {
        let shop = self.load_shop(job.shop_id).await?;
        let network = self.load_network(job.network_id).await?;
        if shop.network_id != network.network_id {
            warn!(
                shop_network_id = shop.network_id,
                "Deploying shop to a network other than its own"
            );
        }

        let deployment = self.records.deployment_lock(shop.shop_id).await?;
        let deployment_id = deployment.deployment_id;

        let deployed = match self.run_stages(job, &shop, &network).await {
            Ok(deployed) => deployed,
            Err(err) => {
                if let Err(record_err) = self.records.fail_deployment(deployment_id, err.to_string()).await {
                    error!(deployment_id = %deployment_id, error = %record_err, "Failed to record deployment failure");
                }
                return Err(err);
            }
        };

        let update = DeploymentUpdate {
            error: None,
            domain: deployed.domain.clone(),
            ipfs_hash: Some(deployed.ipfs.ipfs_hash.clone()),
            ipfs_pinner: Some(deployed.ipfs.ipfs_pinner.clone()),
            ipfs_gateway: deployed.ipfs.ipfs_gateway.clone(),
            bucket_urls: deployed.buckets.iter().map(|b| b.url.clone()).collect(),
            bucket_http_urls: deployed.buckets.iter().map(|b| b.http_url.clone()).collect(),
        };
        if let Err(e) = self.records.pass_deployment(deployment_id, &update).await {
            let err = DeployError::stage(Stage::Record, e);
            // Release the lock so the next deploy is not rejected as pending.
            if let Err(record_err) = self.records.fail_deployment(deployment_id, err.to_string()).await {
                error!(deployment_id = %deployment_id, error = %record_err, "Failed to record deployment failure");
            }
            return Err(err);
        }

        info!(
            deployment_id = %deployment_id,
            hash = %deployed.ipfs.ipfs_hash,
            domain = ?deployed.domain,
            buckets = update.bucket_urls.len(),
            "Deployment succeeded"
        );
        Ok(DeployOutcome::success(
            deployed.ipfs.ipfs_hash,
            deployed.domain,
            update.bucket_http_urls,
        ))
    }

    async fn run_stages(&self, job: &DeployJob, shop: &Shop, network: &Network) -> DeployResult<Deployed> {
        let selection = &job.resource_selection;
        let paths = ShopPaths::new(&self.config.paths.cache_dir, &shop.auth_token);

        let build = self
            .assembler
            .assemble(network, &paths)
            .await
            .map_err(|e| DeployError::stage(Stage::Build, e))?;

        let request = BucketDeployRequest {
            network,
            shop,
            public_dir: &build.public_dir,
            upload_max_retries: self.config.deploy.upload_max_retries,
        };
        let buckets = deploy_to_buckets(&self.bucket_providers, selection, &request)
            .await
            .map_err(|e| DeployError::stage(Stage::Buckets, e))?;
        if buckets.is_empty() {
            info!("No bucket providers available, skipping bucket deploy");
        }

        let settings = IpfsSettings::from(&self.config.deploy);
        let ipfs = deploy_to_ipfs(&self.http, network, selection, &build.public_dir, &settings)
            .await
            .map_err(|e| DeployError::stage(Stage::Ipfs, e))?;
        self.metadata
            .set_shop_has_changes(shop.shop_id, false)
            .await
            .map_err(|e| DeployError::stage(Stage::Ipfs, e))?;

        let domain = match job.subdomain() {
            Some(subdomain) => Some(
                self.point_subdomain(shop, network, selection, subdomain, &ipfs)
                    .await
                    .map_err(|e| DeployError::stage(Stage::Dns, e))?,
            ),
            None => None,
        };

        Ok(Deployed {
            buckets,
            ipfs,
            domain,
        })
    }

    /// CNAME the subdomain at the network's gateway, bind it to the hash and
    /// start AutoSSL priming. Returns the full hostname.
    async fn point_subdomain(
        &self,
        shop: &Shop,
        network: &Network,
        selection: &ResourceSelection,
        subdomain: &str,
        ipfs: &IpfsDeployment,
    ) -> DeployResult<String> {
        let zone = network_zone(network)?;
        let request = DnsRequest::new(
            zone,
            subdomain,
            network.gateway_host(),
            Vec::new(),
            Some(ipfs.ipfs_hash.clone()),
        )?;
        let hostname = request.fqdn();
        let changes = configure_shop_dns(&self.dns_providers, &network.config, selection, &request).await?;

        self.record_deployment_name(shop, &hostname, ipfs).await?;

        match changes {
            Some(changes) if !changes.is_empty() => {
                info!(hostname = %hostname, changes = changes.len(), "Configured DNS");
                self.spawn_autossl(&hostname).await;
            }
            Some(_) => debug!(hostname = %hostname, "DNS already up to date"),
            None => {}
        }
        Ok(hostname)
    }

    async fn record_deployment_name(
        &self,
        shop: &Shop,
        hostname: &str,
        ipfs: &IpfsDeployment,
    ) -> DeployResult<()> {
        if self
            .metadata
            .find_deployment_name(hostname, &ipfs.ipfs_hash)
            .await?
            .is_some()
        {
            return Ok(());
        }
        let name = DeploymentNameRow::new(
            shop.shop_id,
            hostname,
            &ipfs.ipfs_hash,
            Some(ipfs.ipfs_pinner.clone()),
            ipfs.ipfs_gateway.clone(),
        );
        self.metadata.create_deployment_name(&name).await?;
        Ok(())
    }

    async fn spawn_autossl(&self, hostname: &str) {
        let http = self.http.clone();
        let url = autossl_url(hostname);
        let attempts = self.config.deploy.autossl_max_attempts;
        let backoff = self.config.deploy.autossl_backoff();
        self.background.lock().await.spawn(async move {
            prime_autossl(&http, &url, attempts, backoff).await;
        });
    }

    pub(crate) async fn load_shop(&self, shop_id: i64) -> DeployResult<Shop> {
        let row = self
            .metadata
            .get_shop(shop_id)
            .await?
            .ok_or(DeployError::ShopNotFound(shop_id))?;
        Ok(Shop::from(row))
    }

    pub(crate) async fn load_network(&self, network_id: i64) -> DeployResult<Network> {
        let row = self
            .metadata
            .get_network(network_id)
            .await?
            .ok_or(DeployError::NetworkNotFound(network_id))?;
        Ok(row.to_network()?)
    }
}

/// The network's DNS zone.
pub(crate) fn network_zone(network: &Network) -> DeployResult<&str> {
    network
        .config
        .domain
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| {
            DeployError::Config(format!(
                "network {} has no domain configured",
                network.network_id
            ))
        })
}
