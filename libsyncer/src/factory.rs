//! Worker lifecycle factory: lazily creates at most one persistence worker
//! and at most one hydration worker per distinct tenant file name, and hands
//! out their message-passing handles.

use std::collections::HashMap;

use libtenantdb::StoreAdapter;

use crate::config::SyncConfig;
use crate::hydration::{HydrationHandle, HydrationWorker};
use crate::message::PersistenceRequest;
use crate::persistence::{PersistenceHandle, PersistenceWorker};

pub struct WorkerFactory {
    cfg: SyncConfig,
    persistence: Option<PersistenceHandle>,
    hydration: HashMap<String, HydrationHandle>,
}

impl WorkerFactory {
    pub fn new(cfg: SyncConfig) -> Self {
        Self {
            cfg,
            persistence: None,
            hydration: HashMap::new(),
        }
    }

    /// Returns the persistence worker, spawning it on first use. A worker
    /// that has already exited is replaced.
    pub fn start_persistence(&mut self) -> &mut PersistenceHandle {
        if self.persistence.as_ref().is_none_or(|h| !h.is_alive()) {
            self.persistence = Some(PersistenceWorker::spawn(self.cfg.clone()));
        }
        self.persistence
            .as_mut()
            .unwrap_or_else(|| unreachable!("persistence worker just spawned"))
    }

    pub fn persistence(&self) -> Option<&PersistenceHandle> {
        self.persistence.as_ref()
    }

    pub fn terminate_persistence(&mut self) {
        if let Some(handle) = self.persistence.take() {
            handle.terminate();
        }
    }

    /// Wires a store adapter's dirty hook so that every landed write posts a
    /// persist trigger to the persistence worker.
    pub fn attach_adapter(&mut self, adapter: StoreAdapter) -> StoreAdapter {
        let sender = self.start_persistence().sender();
        adapter.with_dirty_hook(move || {
            let _ = sender.send(PersistenceRequest::Persist);
        })
    }

    /// Returns the hydration worker for `file`, spawning it on first use.
    /// Empty file names are refused.
    pub fn start_hydration(&mut self, file: &str) -> Option<&mut HydrationHandle> {
        if file.is_empty() {
            return None;
        }
        Some(
            self.hydration
                .entry(file.to_string())
                .or_insert_with(|| HydrationWorker::spawn(self.cfg.clone())),
        )
    }

    pub fn hydration(&self, file: &str) -> Option<&HydrationHandle> {
        self.hydration.get(file)
    }

    pub fn is_hydration_started(&self, file: &str) -> bool {
        self.hydration.contains_key(file)
    }

    pub fn terminate_hydration(&mut self, file: &str) {
        if let Some(handle) = self.hydration.remove(file) {
            handle.terminate();
        }
    }

    pub fn terminate_all_hydration(&mut self) {
        for (_, handle) in self.hydration.drain() {
            handle.terminate();
        }
    }
}
