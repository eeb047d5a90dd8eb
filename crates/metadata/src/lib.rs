//! Persisted records for the Dshop deployment pipeline.
//!
//! This crate provides:
//! - Shops and networks (with decrypted provider config)
//! - Deployment attempts, including the one-pending-per-shop lock index
//! - Hostname to IPFS hash bindings

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{DeploymentNameRow, DeploymentRow, DeploymentUpdate, NetworkRow, ShopRow};
pub use store::{MetadataStore, SqliteStore};

use dshop_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
