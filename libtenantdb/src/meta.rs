//! Block metadata: the bookkeeping record written alongside every persisted
//! or hydrated snapshot.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Partition, TenantDb, TenantDbError};

/// Key in `raw` under which the application snapshot is stored.
pub const SNAPSHOT_KEY: &str = "state";

/// Field inside a snapshot document that carries the block metadata.
pub const BLOCK_META_FIELD: &str = "blockMeta";

const TIMESTAMP_KEY: &str = "timestamp";
const TENANT_KEY: &str = "tenant";

/// Remote snapshots newer than local by more than this are worth downloading.
pub const STALENESS_THRESHOLD_MS: i64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Milliseconds since the epoch of the last write.
    pub timestamp: i64,
    /// Fully-qualified tenant database name the write belongs to.
    pub tenant: String,
}

impl BlockMeta {
    pub fn now(tenant: &str) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            tenant: tenant.to_string(),
        }
    }

    /// Writes both metadata cells into the `block_meta` partition.
    pub async fn write_to(&self, db: &TenantDb) -> Result<(), TenantDbError> {
        db.put(
            Partition::BlockMeta,
            TIMESTAMP_KEY,
            &serde_json::json!(self.timestamp),
        )
        .await?;
        db.put(
            Partition::BlockMeta,
            TENANT_KEY,
            &serde_json::json!(self.tenant),
        )
        .await?;
        Ok(())
    }

    /// Last persisted timestamp, if any. Absence means no write has ever
    /// completed for this tenant and the next upload must be a full one.
    pub async fn read_timestamp(db: &TenantDb) -> Result<Option<i64>, TenantDbError> {
        Ok(db
            .get(Partition::BlockMeta, TIMESTAMP_KEY)
            .await?
            .and_then(|v| v.as_i64()))
    }

    pub async fn read_tenant(db: &TenantDb) -> Result<Option<String>, TenantDbError> {
        Ok(db
            .get(Partition::BlockMeta, TENANT_KEY)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}

/// True when the remote snapshot is newer than the local one by more than
/// `threshold_ms`.
pub fn should_download_snapshot(local_ts: i64, remote_ts: i64, threshold_ms: i64) -> bool {
    remote_ts - local_ts > threshold_ms
}
