use async_trait::async_trait;
use bytes::Bytes;
use dshop_core::{Network, NetworkConfig, ResourceSelection, Shop};
use dshop_storage::error::{StorageError, StorageResult};
use dshop_storage::traits::{BucketClient, BucketProvider, BucketState};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory bucket client that can fail uploads with a fixed status.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryBucketClient {
    pub buckets: Mutex<HashMap<String, HashMap<String, (Bytes, String)>>>,
    /// Buckets owned by someone else.
    pub foreign: Mutex<Vec<String>>,
    /// Fail this many `put_object` calls with `fail_status` before succeeding.
    pub failures_left: AtomicUsize,
    pub fail_status: u16,
    pub put_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryBucketClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(times: usize, status: u16) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicUsize::new(times),
            fail_status: status,
            ..Default::default()
        })
    }

    pub fn with_bucket(self: Arc<Self>, bucket: &str) -> Arc<Self> {
        self.buckets
            .lock()
            .unwrap()
            .insert(bucket.to_string(), HashMap::new());
        self
    }

    pub fn with_foreign_bucket(self: Arc<Self>, bucket: &str) -> Arc<Self> {
        self.foreign.lock().unwrap().push(bucket.to_string());
        self
    }

    pub fn puts(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<(Bytes, String)> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BucketClient for MemoryBucketClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn bucket_state(&self, bucket: &str) -> StorageResult<BucketState> {
        if self.foreign.lock().unwrap().iter().any(|b| b == bucket) {
            return Ok(BucketState::Forbidden);
        }
        if self.buckets.lock().unwrap().contains_key(bucket) {
            Ok(BucketState::Exists)
        } else {
            Ok(BucketState::Missing)
        }
    }

    async fn create_public_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.buckets
            .lock()
            .unwrap()
            .insert(bucket.to_string(), HashMap::new());
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Status {
                status: self.fail_status,
                message: "injected failure".to_string(),
            });
        }
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::Config(format!("no bucket {bucket}")))?;
        objects.insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("mem://{bucket}")
    }

    fn http_url(&self, bucket: &str) -> String {
        format!("http://memory.test/{bucket}")
    }
}

/// Provider that always hands out the same client.
#[allow(dead_code)]
pub struct StaticProvider {
    pub name: &'static str,
    pub available: bool,
    pub client: Arc<MemoryBucketClient>,
}

#[async_trait]
impl BucketProvider for StaticProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self, _config: &NetworkConfig, _selection: &ResourceSelection) -> bool {
        self.available
    }

    async fn configure(&self, _config: &NetworkConfig) -> StorageResult<Arc<dyn BucketClient>> {
        Ok(self.client.clone())
    }

    fn bucket_name(&self, network_name: &str, auth_token: &str) -> String {
        format!("{}-{network_name}-{auth_token}", self.name)
    }
}

#[allow(dead_code)]
pub fn test_network() -> Network {
    Network {
        network_id: 999,
        name: "localhost".to_string(),
        ipfs_gateway: None,
        ipfs_api: None,
        config: NetworkConfig::default(),
    }
}

#[allow(dead_code)]
pub fn test_shop() -> Shop {
    Shop {
        shop_id: 1,
        name: "Test Shop".to_string(),
        auth_token: "token1".to_string(),
        network_id: 999,
        has_changes: true,
    }
}

/// Write a small public dir: `index.html`, `app.js`, `token1/config.json`.
#[allow(dead_code)]
pub fn sample_site(root: &Path) {
    std::fs::create_dir_all(root.join("token1")).unwrap();
    std::fs::write(root.join("index.html"), "<html>shop</html>").unwrap();
    std::fs::write(root.join("app.js"), "console.log(1)").unwrap();
    std::fs::write(root.join("token1/config.json"), "{}").unwrap();
}
