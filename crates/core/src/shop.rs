//! Shop records, the public `config.json`, and the on-disk cache layout.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A shop as the pipeline sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub shop_id: i64,
    pub name: String,
    /// Names the data directory and suffixes bucket names.
    pub auth_token: String,
    pub network_id: i64,
    /// Set when the shop has changes that are not yet published.
    pub has_changes: bool,
}

/// The shop's public `config.json`.
///
/// Only the keys the build assembler needs are typed; the rest of the file
/// is left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopConfig {
    /// Per-network settings keyed by network id.
    #[serde(default)]
    pub networks: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub theme_id: Option<String>,
    #[serde(default)]
    pub full_title: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
}

impl ShopConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidShopConfig(e.to_string()))
    }

    /// Read and parse `config.json`.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::InvalidShopConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&bytes)
    }

    /// Fail unless the config carries settings for `network_id`.
    pub fn ensure_network(&self, network_id: i64) -> Result<&serde_json::Value> {
        self.networks
            .get(&network_id.to_string())
            .ok_or(Error::NetworkNotInShopConfig(network_id))
    }

    /// Title shown in the storefront `<title>`.
    pub fn display_title(&self) -> &str {
        self.full_title
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or_default()
    }
}

/// Cache layout for one shop: `{cache_dir}/{auth_token}/data` holds the
/// shop's data and `{cache_dir}/{auth_token}/public` the build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopPaths {
    auth_token: String,
    output_dir: PathBuf,
}

impl ShopPaths {
    pub fn new(cache_dir: impl AsRef<Path>, auth_token: impl Into<String>) -> Self {
        let auth_token = auth_token.into();
        let output_dir = cache_dir.as_ref().join(&auth_token);
        Self {
            auth_token,
            output_dir,
        }
    }

    /// Directory name the data directory is published under inside `public/`.
    pub fn data_dir_name(&self) -> &str {
        &self.auth_token
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.output_dir.join("data")
    }

    pub fn public_dir(&self) -> PathBuf {
        self.output_dir.join("public")
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir().join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_json() {
        let json = br#"{
            "networks": {"999": {"marketplaceContract": "0xabc"}},
            "themeId": "fashion",
            "fullTitle": "My Shop",
            "title": "Shop",
            "metaDescription": "Things for sale",
            "someOtherKey": [1, 2, 3]
        }"#;
        let config = ShopConfig::from_json(json).unwrap();
        assert_eq!(config.theme_id.as_deref(), Some("fashion"));
        assert_eq!(config.display_title(), "My Shop");
        assert!(config.ensure_network(999).is_ok());
        assert!(matches!(
            config.ensure_network(1),
            Err(Error::NetworkNotInShopConfig(1))
        ));
    }

    #[test]
    fn test_malformed_config_json() {
        let err = ShopConfig::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidShopConfig(_)));
    }

    #[tokio::test]
    async fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = ShopConfig::load(&dir.path().join("config.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidShopConfig(_)));
    }

    #[test]
    fn test_shop_paths_layout() {
        let paths = ShopPaths::new("/var/cache/dshop", "tok123");
        assert_eq!(paths.output_dir(), Path::new("/var/cache/dshop/tok123"));
        assert_eq!(paths.data_dir(), PathBuf::from("/var/cache/dshop/tok123/data"));
        assert_eq!(
            paths.public_dir(),
            PathBuf::from("/var/cache/dshop/tok123/public")
        );
        assert_eq!(
            paths.config_path(),
            PathBuf::from("/var/cache/dshop/tok123/data/config.json")
        );
        assert_eq!(paths.data_dir_name(), "tok123");
    }
}
