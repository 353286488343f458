//! Background synchronization subsystem: a pair of isolated workers that
//! persist local application state to a tenant-scoped database, upload only
//! the changed portion to a remote store, download full snapshots on demand,
//! and coordinate graceful shutdown of in-flight network operations.
//!
//! The workers are tokio tasks communicating only via message passing and the
//! shared per-tenant database; all per-worker state (pause latch, baseline
//! snapshot, execution-handle set, cached database handle) is private to the
//! worker that owns it.

pub mod config;
pub mod debounce;
pub mod diff;
pub mod error;
pub mod exec;
pub mod factory;
pub mod fetch;
pub mod hydration;
pub mod message;
pub mod persistence;
pub mod supervise;

pub use config::SyncConfig;
pub use error::FetchError;
pub use factory::WorkerFactory;
pub use hydration::{HydrationHandle, HydrationWorker};
pub use message::{HydrationRequest, PersistenceRequest, WorkerEvent};
pub use persistence::{PersistenceHandle, PersistenceWorker};
