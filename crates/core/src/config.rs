//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem layout used by the build assembler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the per-shop cache (`{cache_dir}/{auth_token}/data`, `.../public`).
    pub cache_dir: PathBuf,
    /// Directory holding one sub-directory per theme id.
    #[serde(default = "default_themes_dir")]
    pub themes_dir: PathBuf,
    /// Default storefront build used when the shop has no theme.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,
}

fn default_themes_dir() -> PathBuf {
    PathBuf::from("./themes")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("./dist")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./data/cache"),
            themes_dir: default_themes_dir(),
            dist_dir: default_dist_dir(),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/dshop.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// Deployment pipeline tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Age after which a pending deployment is considered abandoned.
    #[serde(default = "default_lock_stale_after_secs")]
    pub lock_stale_after_secs: u64,
    /// Retries per object after a 502 from object storage.
    /// The first attempt is not counted, so the total is `upload_max_retries + 1`.
    #[serde(default = "default_upload_max_retries")]
    pub upload_max_retries: u32,
    /// Maximum in-flight gateway priming requests.
    #[serde(default = "default_gateway_prime_concurrency")]
    pub gateway_prime_concurrency: usize,
    /// Public IPFS gateway primed after every pin.
    #[serde(default = "default_public_ipfs_gateway")]
    pub public_ipfs_gateway: String,
    /// Pinata's gateway, primed only when Pinata is configured.
    #[serde(default = "default_pinata_gateway")]
    pub pinata_gateway: String,
    /// Origin substituted for `%UI_SRC%` in the CDN-variant entry point.
    #[serde(default)]
    pub ui_cdn: Option<String>,
    /// AutoSSL priming attempts after DNS points at a gateway.
    #[serde(default = "default_autossl_max_attempts")]
    pub autossl_max_attempts: u32,
    /// Linear backoff unit for AutoSSL priming (`attempt * unit`).
    #[serde(default = "default_autossl_backoff_secs")]
    pub autossl_backoff_secs: u64,
}

fn default_lock_stale_after_secs() -> u64 {
    600 // 10 minutes
}

fn default_upload_max_retries() -> u32 {
    3
}

fn default_gateway_prime_concurrency() -> usize {
    10
}

fn default_public_ipfs_gateway() -> String {
    "https://ipfs.io".to_string()
}

fn default_pinata_gateway() -> String {
    "https://gateway.pinata.cloud".to_string()
}

fn default_autossl_max_attempts() -> u32 {
    5
}

fn default_autossl_backoff_secs() -> u64 {
    30
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            lock_stale_after_secs: default_lock_stale_after_secs(),
            upload_max_retries: default_upload_max_retries(),
            gateway_prime_concurrency: default_gateway_prime_concurrency(),
            public_ipfs_gateway: default_public_ipfs_gateway(),
            pinata_gateway: default_pinata_gateway(),
            ui_cdn: None,
            autossl_max_attempts: default_autossl_max_attempts(),
            autossl_backoff_secs: default_autossl_backoff_secs(),
        }
    }
}

impl DeployConfig {
    /// Pending deployments older than this are reaped.
    pub fn lock_stale_after(&self) -> time::Duration {
        let secs = i64::try_from(self.lock_stale_after_secs).unwrap_or(i64::MAX);
        time::Duration::seconds(secs)
    }

    /// Backoff unit for AutoSSL priming.
    pub fn autossl_backoff(&self) -> Duration {
        Duration::from_secs(self.autossl_backoff_secs)
    }
}

/// Google Cloud API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Interval between `Operation` polls.
    #[serde(default = "default_operation_poll_interval_ms")]
    pub operation_poll_interval_ms: u64,
    /// Polls before an operation is reported as timed out.
    #[serde(default = "default_operation_poll_max_attempts")]
    pub operation_poll_max_attempts: u32,
    /// Override for `https://storage.googleapis.com` (tests, emulators).
    #[serde(default)]
    pub storage_endpoint: Option<String>,
    /// Override for `https://compute.googleapis.com`.
    #[serde(default)]
    pub compute_endpoint: Option<String>,
    /// Override for `https://dns.googleapis.com`.
    #[serde(default)]
    pub dns_endpoint: Option<String>,
}

fn default_operation_poll_interval_ms() -> u64 {
    5000
}

fn default_operation_poll_max_attempts() -> u32 {
    10
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            operation_poll_interval_ms: default_operation_poll_interval_ms(),
            operation_poll_max_attempts: default_operation_poll_max_attempts(),
            storage_endpoint: None,
            compute_endpoint: None,
            dns_endpoint: None,
        }
    }
}

impl GcpConfig {
    pub fn operation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.operation_poll_interval_ms)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Filesystem layout.
    pub paths: PathsConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Pipeline tuning.
    #[serde(default)]
    pub deploy: DeployConfig,
    /// Google Cloud API settings.
    #[serde(default)]
    pub gcp: GcpConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at `root`.
    ///
    /// **For testing only.**
    pub fn for_testing(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            paths: PathsConfig {
                cache_dir: root.join("cache"),
                themes_dir: root.join("themes"),
                dist_dir: root.join("dist"),
            },
            metadata: MetadataConfig::Sqlite {
                path: root.join("dshop.db"),
                query_timeout_secs: None,
            },
            deploy: DeployConfig::default(),
            gcp: GcpConfig::default(),
        }
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.deploy.gateway_prime_concurrency == 0 {
            return Err("deploy.gateway_prime_concurrency must be at least 1".to_string());
        }
        if self.deploy.autossl_max_attempts == 0 {
            return Err("deploy.autossl_max_attempts must be at least 1".to_string());
        }
        if self.gcp.operation_poll_max_attempts == 0 {
            return Err("gcp.operation_poll_max_attempts must be at least 1".to_string());
        }
        if self.deploy.lock_stale_after_secs > i64::MAX as u64 {
            return Err(format!(
                "deploy.lock_stale_after_secs {} exceeds maximum value {}",
                self.deploy.lock_stale_after_secs,
                i64::MAX
            ));
        }
        Ok(())
    }
}
