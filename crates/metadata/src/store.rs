//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{DeploymentNameRepo, DeploymentRepo, NetworkRepo, ShopRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    ShopRepo + NetworkRepo + DeploymentRepo + DeploymentNameRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    #[allow(dead_code)] // Advisory; SQLite has no statement timeout
    query_timeout_secs: u64,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers; the pending-deployment
            // index still guards the lock if this is ever raised.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout_secs,
        };
        store.migrate().await?;
        debug!(path = %path.display(), "Opened metadata store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error, needle: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // SQLite reports either "UNIQUE constraint failed: deployments.shop_id"
            // or the index name, depending on the index kind.
            let msg = db_err.message();
            msg.contains("UNIQUE constraint") && msg.contains(needle)
        }
        _ => false,
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use dshop_core::DeploymentStatus;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl NetworkRepo for SqliteStore {
        async fn upsert_network(&self, network: &NetworkRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO networks (network_id, name, ipfs_gateway, ipfs_api, config_json, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(network_id) DO UPDATE SET
                    name = excluded.name,
                    ipfs_gateway = excluded.ipfs_gateway,
                    ipfs_api = excluded.ipfs_api,
                    config_json = excluded.config_json,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(network.network_id)
            .bind(&network.name)
            .bind(&network.ipfs_gateway)
            .bind(&network.ipfs_api)
            .bind(&network.config_json)
            .bind(network.created_at)
            .bind(network.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_network(&self, network_id: i64) -> MetadataResult<Option<NetworkRow>> {
            let row =
                sqlx::query_as::<_, NetworkRow>("SELECT * FROM networks WHERE network_id = ?")
                    .bind(network_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl ShopRepo for SqliteStore {
        async fn create_shop(&self, shop: &ShopRow) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                INSERT INTO shops (shop_id, name, auth_token, network_id, has_changes, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(shop.shop_id)
            .bind(&shop.name)
            .bind(&shop.auth_token)
            .bind(shop.network_id)
            .bind(shop.has_changes)
            .bind(shop.created_at)
            .bind(shop.updated_at)
            .execute(&self.pool)
            .await;
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e, "shops") => Err(MetadataError::AlreadyExists(
                    format!("shop {} or auth token already exists", shop.shop_id),
                )),
                Err(e) => Err(e.into()),
            }
        }

        async fn get_shop(&self, shop_id: i64) -> MetadataResult<Option<ShopRow>> {
            let row = sqlx::query_as::<_, ShopRow>("SELECT * FROM shops WHERE shop_id = ?")
                .bind(shop_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn set_shop_has_changes(&self, shop_id: i64, has_changes: bool) -> MetadataResult<()> {
            let result =
                sqlx::query("UPDATE shops SET has_changes = ?, updated_at = ? WHERE shop_id = ?")
                    .bind(has_changes)
                    .bind(OffsetDateTime::now_utc())
                    .bind(shop_id)
                    .execute(&self.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("shop {shop_id}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DeploymentRepo for SqliteStore {
        async fn create_deployment(&self, deployment: &DeploymentRow) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                INSERT INTO deployments (
                    deployment_id, shop_id, status, error, domain, ipfs_hash, ipfs_pinner,
                    ipfs_gateway, bucket_urls, bucket_http_urls, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(deployment.deployment_id)
            .bind(deployment.shop_id)
            .bind(&deployment.status)
            .bind(&deployment.error)
            .bind(&deployment.domain)
            .bind(&deployment.ipfs_hash)
            .bind(&deployment.ipfs_pinner)
            .bind(&deployment.ipfs_gateway)
            .bind(&deployment.bucket_urls)
            .bind(&deployment.bucket_http_urls)
            .bind(deployment.created_at)
            .bind(deployment.updated_at)
            .execute(&self.pool)
            .await;
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e, "deployments") => {
                    Err(MetadataError::Constraint(format!(
                        "shop {} already has a pending deployment",
                        deployment.shop_id
                    )))
                }
                Err(e) => Err(e.into()),
            }
        }

        async fn get_deployment(
            &self,
            deployment_id: Uuid,
        ) -> MetadataResult<Option<DeploymentRow>> {
            let row = sqlx::query_as::<_, DeploymentRow>(
                "SELECT * FROM deployments WHERE deployment_id = ?",
            )
            .bind(deployment_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_pending_deployment(
            &self,
            shop_id: i64,
        ) -> MetadataResult<Option<DeploymentRow>> {
            let row = sqlx::query_as::<_, DeploymentRow>(
                "SELECT * FROM deployments WHERE shop_id = ? AND status = 'pending'",
            )
            .bind(shop_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn finish_deployment(
            &self,
            deployment_id: Uuid,
            status: DeploymentStatus,
            update: &DeploymentUpdate,
        ) -> MetadataResult<()> {
            if !status.is_terminal() {
                return Err(MetadataError::InvalidStateTransition {
                    from: DeploymentStatus::Pending.to_string(),
                    to: status.to_string(),
                });
            }

            let bucket_urls = serde_json::to_string(&update.bucket_urls)?;
            let bucket_http_urls = serde_json::to_string(&update.bucket_http_urls)?;
            let result = sqlx::query(
                r#"
                UPDATE deployments SET
                    status = ?, error = ?, domain = ?, ipfs_hash = ?, ipfs_pinner = ?,
                    ipfs_gateway = ?, bucket_urls = ?, bucket_http_urls = ?, updated_at = ?
                WHERE deployment_id = ? AND status = 'pending'
                "#,
            )
            .bind(status.as_str())
            .bind(&update.error)
            .bind(&update.domain)
            .bind(&update.ipfs_hash)
            .bind(&update.ipfs_pinner)
            .bind(&update.ipfs_gateway)
            .bind(bucket_urls)
            .bind(bucket_http_urls)
            .bind(OffsetDateTime::now_utc())
            .bind(deployment_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return match self.get_deployment(deployment_id).await? {
                    Some(existing) => Err(MetadataError::InvalidStateTransition {
                        from: existing.status,
                        to: status.to_string(),
                    }),
                    None => Err(MetadataError::NotFound(format!(
                        "deployment {deployment_id}"
                    ))),
                };
            }
            Ok(())
        }

        async fn list_deployments(
            &self,
            shop_id: i64,
            limit: u32,
        ) -> MetadataResult<Vec<DeploymentRow>> {
            let rows = sqlx::query_as::<_, DeploymentRow>(
                "SELECT * FROM deployments WHERE shop_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            )
            .bind(shop_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn latest_successful_deployment(
            &self,
            shop_id: i64,
        ) -> MetadataResult<Option<DeploymentRow>> {
            let row = sqlx::query_as::<_, DeploymentRow>(
                r#"
                SELECT * FROM deployments
                WHERE shop_id = ? AND status = 'success'
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
            )
            .bind(shop_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl DeploymentNameRepo for SqliteStore {
        async fn find_deployment_name(
            &self,
            hostname: &str,
            ipfs_hash: &str,
        ) -> MetadataResult<Option<DeploymentNameRow>> {
            let row = sqlx::query_as::<_, DeploymentNameRow>(
                "SELECT * FROM deployment_names WHERE hostname = ? AND ipfs_hash = ? LIMIT 1",
            )
            .bind(hostname)
            .bind(ipfs_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn create_deployment_name(&self, name: &DeploymentNameRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO deployment_names (id, shop_id, hostname, ipfs_hash, ipfs_pinner, ipfs_gateway, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(name.id)
            .bind(name.shop_id)
            .bind(&name.hostname)
            .bind(&name.ipfs_hash)
            .bind(&name.ipfs_pinner)
            .bind(&name.ipfs_gateway)
            .bind(name.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn list_deployment_names(
            &self,
            shop_id: i64,
        ) -> MetadataResult<Vec<DeploymentNameRow>> {
            let rows = sqlx::query_as::<_, DeploymentNameRow>(
                "SELECT * FROM deployment_names WHERE shop_id = ? ORDER BY created_at DESC",
            )
            .bind(shop_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS networks (
    network_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    ipfs_gateway TEXT,
    ipfs_api TEXT,
    config_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS shops (
    shop_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    auth_token TEXT NOT NULL UNIQUE,
    network_id INTEGER NOT NULL REFERENCES networks(network_id),
    has_changes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deployments (
    deployment_id BLOB PRIMARY KEY,
    shop_id INTEGER NOT NULL REFERENCES shops(shop_id),
    status TEXT NOT NULL,
    error TEXT,
    domain TEXT,
    ipfs_hash TEXT,
    ipfs_pinner TEXT,
    ipfs_gateway TEXT,
    bucket_urls TEXT,
    bucket_http_urls TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_deployments_shop_created ON deployments(shop_id, created_at);
-- At most one pending deployment per shop: closes the check-then-insert race in the lock.
CREATE UNIQUE INDEX IF NOT EXISTS idx_deployments_shop_pending ON deployments(shop_id) WHERE status = 'pending';

CREATE TABLE IF NOT EXISTS deployment_names (
    id BLOB PRIMARY KEY,
    shop_id INTEGER NOT NULL REFERENCES shops(shop_id),
    hostname TEXT NOT NULL,
    ipfs_hash TEXT NOT NULL,
    ipfs_pinner TEXT,
    ipfs_gateway TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_deployment_names_lookup ON deployment_names(hostname, ipfs_hash);
"#;
