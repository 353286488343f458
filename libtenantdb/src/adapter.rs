//! Persistence adapter for the reactive store.
//!
//! Writes are gated on the hydrated flag so that a half-bootstrapped store
//! never overwrites good local state. Once a write lands, an optional dirty
//! hook fires; the worker factory wires it to post a persist trigger to the
//! persistence worker.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::{Partition, TenantDb, TenantDbError, qualified_name};

type DirtyHook = Box<dyn Fn() + Send + Sync>;

pub struct StoreAdapter {
    db: TenantDb,
    hydrated: AtomicBool,
    on_dirty: Option<DirtyHook>,
}

impl StoreAdapter {
    pub fn new(db: TenantDb) -> Self {
        Self {
            db,
            hydrated: AtomicBool::new(false),
            on_dirty: None,
        }
    }

    /// Opens the tenant-scoped database for `base` and `tenant_key` and
    /// returns an adapter over it, not yet hydrated.
    pub async fn for_tenant(
        root: &std::path::Path,
        base: &str,
        tenant_key: &str,
    ) -> Result<Self, TenantDbError> {
        let db = TenantDb::open(root, &qualified_name(base, Some(tenant_key))).await?;
        Ok(Self::new(db))
    }

    pub fn with_dirty_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_dirty = Some(Box::new(hook));
        self
    }

    pub fn set_hydrated(&self, value: bool) {
        debug!(value, "store hydrated flag changed");
        self.hydrated.store(value, Ordering::SeqCst);
    }

    pub fn hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    pub fn db(&self) -> &TenantDb {
        &self.db
    }

    /// Missing keys read as an empty document.
    pub async fn get_item(&self, key: &str) -> Result<serde_json::Value, TenantDbError> {
        Ok(self
            .db
            .get(Partition::Raw, key)
            .await?
            .unwrap_or_else(|| serde_json::json!({})))
    }

    /// No-op success until the store is hydrated.
    pub async fn set_item(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), TenantDbError> {
        if !self.hydrated() {
            debug!(key, "store not hydrated yet, skipping write");
            return Ok(());
        }
        self.db.put(Partition::Raw, key, value).await?;
        if let Some(hook) = &self.on_dirty {
            hook();
        }
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), TenantDbError> {
        self.db.remove(Partition::Raw, key).await
    }
}
