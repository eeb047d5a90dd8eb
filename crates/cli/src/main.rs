//! Operator CLI for the Dshop deployment pipeline.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dshop_core::config::AppConfig;
use dshop_core::{DeployOutcome, ResourceSelection};
use dshop_deploy::{CdnJob, DeployJob, Deployer};
use dshop_metadata::MetadataStore;
use dshop_metadata::repos::{DeploymentRepo, ShopRepo};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Parser)]
#[command(name = "dshopctl")]
#[command(about = "Operator CLI for the Dshop deployment pipeline")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "DSHOP_CONFIG",
        default_value = "config/dshop.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct ResourceArgs {
    /// Provider tags to enable (e.g. aws-files,gcp-cdn,cloudflare-dns)
    #[arg(long = "resources", value_delimiter = ',')]
    resources: Vec<String>,
}

impl ResourceArgs {
    fn selection(&self) -> ResourceSelection {
        ResourceSelection::from(self.resources.clone())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build and publish a shop
    Deploy {
        /// Shop to deploy
        #[arg(long, required_unless_present = "job_file")]
        shop_id: Option<i64>,
        /// Network to deploy against (defaults to the shop's network)
        #[arg(long)]
        network_id: Option<i64>,
        /// Subdomain under the network's zone to point at the build
        #[arg(long)]
        subdomain: Option<String>,
        /// Read the job payload from a JSON file instead of flags
        #[arg(long, conflicts_with_all = ["shop_id", "network_id", "subdomain", "resources"])]
        job_file: Option<PathBuf>,
        #[command(flatten)]
        resources: ResourceArgs,
    },
    /// Put a shop's buckets behind the selected CDNs
    ConfigureCdn {
        #[arg(long)]
        shop_id: i64,
        /// Subdomain under the network's zone to point at the CDN
        #[arg(long)]
        subdomain: Option<String>,
        /// Domains to serve (defaults to the subdomain under the network's zone)
        #[arg(long = "domain")]
        domains: Vec<String>,
        #[command(flatten)]
        resources: ResourceArgs,
    },
    /// List a shop's deployments, newest first
    History {
        #[arg(long)]
        shop_id: i64,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    /// Create or update the metadata schema
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();
    let config = load_config(&config)?;
    let metadata = dshop_metadata::from_config(&config.metadata)
        .await
        .context("failed to open metadata store")?;

    match command {
        Commands::Deploy {
            shop_id,
            network_id,
            subdomain,
            job_file,
            resources,
        } => {
            let job = match job_file {
                Some(path) => read_job(&path).await?,
                None => {
                    let shop_id = shop_id.context("--shop-id is required")?;
                    let network_id = match network_id {
                        Some(id) => id,
                        None => shop_network(metadata.as_ref(), shop_id).await?,
                    };
                    DeployJob {
                        subdomain,
                        resource_selection: resources.selection(),
                        ..DeployJob::new(network_id, shop_id)
                    }
                }
            };
            handle_deploy(config, metadata, &job).await
        }
        Commands::ConfigureCdn {
            shop_id,
            subdomain,
            domains,
            resources,
        } => {
            let job = CdnJob {
                shop_id,
                subdomain,
                domains,
                resource_selection: resources.selection(),
            };
            let configurations = Deployer::new(config, metadata)
                .configure_cdn(&job)
                .await
                .context("failed to configure CDN")?;
            println!("{}", serde_json::to_string_pretty(&configurations)?);
            Ok(())
        }
        Commands::History { shop_id, limit } => {
            handle_history(metadata.as_ref(), shop_id, limit).await
        }
        Commands::Migrate => {
            metadata.migrate().await.context("migration failed")?;
            metadata.health_check().await.context("health check failed")?;
            println!("Metadata schema is up to date.");
            Ok(())
        }
    }
}

/// Load configuration from the TOML file (optional) and `DSHOP_` env vars.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    let has_config_file = path.exists();

    if has_config_file {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("DSHOP_") && key != "DSHOP_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: dshopctl --config /path/to/dshop.toml\n  \
             2. Environment variables: DSHOP_PATHS__CACHE_DIR=/var/cache/dshop dshopctl\n\n\
             Set DSHOP_CONFIG to change the default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("DSHOP_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;
    Ok(config)
}

async fn read_job(path: &Path) -> Result<DeployJob> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid job payload in {}", path.display()))
}

async fn shop_network(metadata: &dyn MetadataStore, shop_id: i64) -> Result<i64> {
    let shop = metadata
        .get_shop(shop_id)
        .await?
        .with_context(|| format!("shop {shop_id} not found"))?;
    Ok(shop.network_id)
}

async fn handle_deploy(config: AppConfig, metadata: Arc<dyn MetadataStore>, job: &DeployJob) -> Result<()> {
    let deployer = Deployer::new(config, metadata);
    let outcome = deployer.deploy(job).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    let primed = deployer.wait_background().await;
    if primed > 0 {
        tracing::debug!(tasks = primed, "Background priming finished");
    }
    match outcome {
        DeployOutcome::Success { .. } => Ok(()),
        DeployOutcome::Failure { id, message, .. } => {
            anyhow::bail!("deployment failed ({}): {message}", id.code())
        }
    }
}

async fn handle_history(metadata: &dyn MetadataStore, shop_id: i64, limit: u32) -> Result<()> {
    let deployments = metadata.list_deployments(shop_id, limit).await?;

    if deployments.is_empty() {
        println!("No deployments found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<9} {:<26} {:<48} {:<30} Error",
        "ID", "Status", "Created", "IPFS Hash", "Domain"
    );
    println!("{}", "-".repeat(170));
    for deployment in deployments {
        let created = deployment
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| deployment.created_at.to_string());
        println!(
            "{:<38} {:<9} {:<26} {:<48} {:<30} {}",
            deployment.deployment_id,
            deployment.status,
            created,
            deployment.ipfs_hash.as_deref().unwrap_or("-"),
            deployment.domain.as_deref().unwrap_or("-"),
            deployment.error.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
