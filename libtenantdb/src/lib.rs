//! Tenant-scoped local key/value storage.
//!
//! One versioned SQLite database per fully-qualified tenant name
//! (`base:tenantKey`), with two partitions: `raw` holds the serialized
//! application snapshot, `block_meta` holds write-ahead bookkeeping
//! (last write timestamp, tenant tag). Tenant isolation is enforced by the
//! database name itself, never by a column.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

mod adapter;
mod error;
pub mod meta;

pub use adapter::StoreAdapter;
pub use error::TenantDbError;

/// Bumped whenever the partition layout changes; stamped into `raw` under
/// `schemaVersion` and mirrored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 17;

/// Key in `raw` that carries the stamped schema version.
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

const TENANT_SEPARATOR: char = ':';

/// Composes a fully-qualified database name from a base name and an optional
/// tenant key.
pub fn qualified_name(base: &str, tenant: Option<&str>) -> String {
    match tenant {
        Some(key) => format!("{base}{TENANT_SEPARATOR}{key}"),
        None => base.to_string(),
    }
}

/// The two logical partitions of a tenant database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Raw,
    BlockMeta,
}

impl Partition {
    fn table(self) -> &'static str {
        match self {
            Partition::Raw => "raw",
            Partition::BlockMeta => "block_meta",
        }
    }
}

/// Handle to one tenant-scoped database. Cheap to clone; the pool is shared.
#[derive(Clone, Debug)]
pub struct TenantDb {
    pool: SqlitePool,
    name: String,
}

impl TenantDb {
    /// Opens (or creates) the database for `name` under `root`.
    ///
    /// A name with more than one tenant separator means a double-namespaced
    /// key and is rejected outright.
    pub async fn open(root: &Path, name: &str) -> Result<Self, TenantDbError> {
        if separator_count(name) > 1 {
            return Err(TenantDbError::InvalidTenantKey(name.to_string()));
        }
        Self::open_unchecked(root, name).await
    }

    /// Opener used by the hydration path. It only accepts fully-qualified
    /// names, so exactly one separator is required (zero is also invalid).
    pub async fn open_for_peek(root: &Path, full_name: &str) -> Result<Self, TenantDbError> {
        if separator_count(full_name) != 1 {
            return Err(TenantDbError::InvalidTenantKey(full_name.to_string()));
        }
        Self::open_unchecked(root, full_name).await
    }

    async fn open_unchecked(root: &Path, name: &str) -> Result<Self, TenantDbError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| TenantDbError::Database(sqlx::Error::Io(e)))?;
        let options = SqliteConnectOptions::new()
            .filename(root.join(format!("{name}.db")))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let db = Self {
            pool,
            name: name.to_string(),
        };
        db.upgrade().await?;
        Ok(db)
    }

    /// Creates missing partitions and stamps the current schema version.
    async fn upgrade(&self) -> Result<(), TenantDbError> {
        let current: i64 = sqlx::query("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?
            .get(0);
        if current >= SCHEMA_VERSION {
            return Ok(());
        }
        info!(name = %self.name, from = current, to = SCHEMA_VERSION, "upgrading tenant database");
        for partition in [Partition::Raw, Partition::BlockMeta] {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} (k TEXT PRIMARY KEY, v TEXT NOT NULL)",
                partition.table()
            ))
            .execute(&self.pool)
            .await?;
        }
        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(&self.pool)
            .await?;
        self.put(
            Partition::Raw,
            SCHEMA_VERSION_KEY,
            &serde_json::json!(SCHEMA_VERSION),
        )
        .await?;
        Ok(())
    }

    /// Fully-qualified database name this handle was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<serde_json::Value>, TenantDbError> {
        let row = sqlx::query(&format!(
            "SELECT v FROM {} WHERE k = ?1",
            partition.table()
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let text: String = row.get(0);
                Ok(Some(serde_json::from_str(&text)?))
            }
            None => Ok(None),
        }
    }

    pub async fn put(
        &self,
        partition: Partition,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), TenantDbError> {
        let text = serde_json::to_string(value)?;
        sqlx::query(&format!(
            "INSERT INTO {} (k, v) VALUES (?1, ?2) ON CONFLICT(k) DO UPDATE SET v = excluded.v",
            partition.table()
        ))
        .bind(key)
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, partition: Partition, key: &str) -> Result<(), TenantDbError> {
        sqlx::query(&format!("DELETE FROM {} WHERE k = ?1", partition.table()))
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Closes the underlying pool. The owner is expected to drop its cached
    /// handle and name afterwards, forcing re-derivation on next use.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn separator_count(name: &str) -> usize {
    name.matches(TENANT_SEPARATOR).count()
}
