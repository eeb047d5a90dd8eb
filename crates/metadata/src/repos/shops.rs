//! Shop repository.

use crate::error::MetadataResult;
use crate::models::ShopRow;
use async_trait::async_trait;

/// Repository for shop records.
#[async_trait]
pub trait ShopRepo: Send + Sync {
    /// Create a shop.
    async fn create_shop(&self, shop: &ShopRow) -> MetadataResult<()>;

    /// Get a shop by ID.
    async fn get_shop(&self, shop_id: i64) -> MetadataResult<Option<ShopRow>>;

    /// Set or clear the "has unpublished changes" flag.
    async fn set_shop_has_changes(&self, shop_id: i64, has_changes: bool) -> MetadataResult<()>;
}
