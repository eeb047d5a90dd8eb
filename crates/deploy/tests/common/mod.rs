#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use dshop_core::config::AppConfig;
use dshop_core::{Network, NetworkConfig, ResourceSelection, ResourceTag};
use dshop_deploy::Deployer;
use dshop_metadata::repos::{NetworkRepo, ShopRepo};
use dshop_metadata::{MetadataStore, NetworkRow, ShopRow, SqliteStore};
use dshop_storage::error::StorageResult;
use dshop_storage::{BucketClient, BucketProvider, BucketState};
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SHOP_ID: i64 = 1;
pub const NETWORK_ID: i64 = 999;
pub const AUTH_TOKEN: &str = "token1";

pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

pub struct Fixture {
    pub dir: TempDir,
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
}

impl Fixture {
    /// A shop on network 999 with a default storefront and a data dir.
    ///
    /// `ipfs_api` is the network's IPFS API, normally an httpmock server.
    pub async fn new(ipfs_api: &str) -> Self {
        Self::with_network(Network {
            network_id: NETWORK_ID,
            name: "localhost".to_string(),
            ipfs_gateway: None,
            ipfs_api: Some(ipfs_api.to_string()),
            config: NetworkConfig::default(),
        })
        .await
    }

    pub async fn with_network(network: Network) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_testing(dir.path());
        let store = Arc::new(
            SqliteStore::new(dir.path().join("dshop.db"), None)
                .await
                .unwrap(),
        );
        store
            .upsert_network(&NetworkRow::from_network(&network).unwrap())
            .await
            .unwrap();
        store
            .create_shop(&ShopRow::new(SHOP_ID, "Test Shop", AUTH_TOKEN, network.network_id))
            .await
            .unwrap();

        write(
            &config.paths.dist_dir.join("index.html"),
            "<title>%TITLE%</title><body data-dir=\"%DATA_DIR%\" data-network=\"%NETWORK%\">",
        );
        write(
            &config.paths.dist_dir.join("cdn.html"),
            "<script src=\"%UI_SRC%/app.js\"></script>",
        );
        write(&config.paths.dist_dir.join("app.js"), "console.log('shop')");
        write(&config.paths.dist_dir.join("assets/logo.svg"), "<svg/>");

        let data_dir = config.paths.cache_dir.join(AUTH_TOKEN).join("data");
        write(
            &data_dir.join("config.json"),
            &format!(r#"{{"networks": {{"{}": {{}}}}, "fullTitle": "Tom & Jerry"}}"#, network.network_id),
        );
        write(&data_dir.join("products.json"), "[]");
        write(&data_dir.join("items/1/data.json"), "{}");

        Self { dir, config, store }
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    pub fn public_dir(&self) -> std::path::PathBuf {
        self.config.paths.cache_dir.join(AUTH_TOKEN).join("public")
    }

    pub fn deployer(&self) -> Deployer {
        Deployer::new(self.config.clone(), self.metadata())
    }

    pub fn deployer_with_buckets(&self, buckets: Vec<Arc<dyn BucketProvider>>) -> Deployer {
        Deployer::with_providers(
            self.config.clone(),
            self.metadata(),
            reqwest::Client::new(),
            buckets,
            Vec::new(),
            Vec::new(),
        )
    }
}

pub fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// NDJSON body a Kubo `add` returns for the wrapped `public` directory.
pub fn kubo_add_response(hash: &str) -> String {
    format!(
        "{{\"Name\":\"public/index.html\",\"Hash\":\"QmFile\",\"Size\":\"10\"}}\n{{\"Name\":\"public\",\"Hash\":\"{hash}\",\"Size\":\"100\"}}\n"
    )
}

/// Bucket client keeping uploaded keys in memory.
#[derive(Default)]
pub struct MemoryBuckets {
    pub objects: Mutex<BTreeMap<String, Vec<String>>>,
}

impl MemoryBuckets {
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys = self
            .objects
            .lock()
            .unwrap()
            .get(bucket)
            .cloned()
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BucketClient for MemoryBuckets {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn bucket_state(&self, bucket: &str) -> StorageResult<BucketState> {
        if self.objects.lock().unwrap().contains_key(bucket) {
            Ok(BucketState::Exists)
        } else {
            Ok(BucketState::Missing)
        }
    }

    async fn create_public_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(bucket.to_string(), Vec::new());
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        _data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        self.objects
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .push(key.to_string());
        Ok(())
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("mem://{bucket}")
    }

    fn http_url(&self, bucket: &str) -> String {
        format!("http://memory.test/{bucket}")
    }
}

/// Provider selected by `aws-files` that hands out one memory client.
pub struct MemoryProvider {
    pub client: Arc<MemoryBuckets>,
}

#[async_trait]
impl BucketProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self, _config: &NetworkConfig, selection: &ResourceSelection) -> bool {
        selection.contains(ResourceTag::AwsFiles)
    }

    async fn configure(&self, _config: &NetworkConfig) -> StorageResult<Arc<dyn BucketClient>> {
        Ok(self.client.clone())
    }

    fn bucket_name(&self, network_name: &str, auth_token: &str) -> String {
        format!("dshop-{network_name}-{auth_token}")
    }
}
