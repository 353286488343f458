//! Persistence worker: owns the write path. Debounces persist triggers,
//! diffs the current snapshot against the last uploaded baseline, and pushes
//! either a full snapshot (first write) or a delta to the remote store.
//! Upload is at-most-once best-effort per window; failures are logged and the
//! next natural trigger is the retry path.

use std::sync::Arc;

use reqwest::{Client, Method};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use libtenantdb::meta::{BLOCK_META_FIELD, BlockMeta, SNAPSHOT_KEY};
use libtenantdb::{Partition, TenantDb};

use crate::config::SyncConfig;
use crate::debounce::{Admission, Debouncer};
use crate::diff;
use crate::exec::ExecutionTracker;
use crate::fetch::{FetchRequest, bounded_fetch};
use crate::message::{PersistenceRequest, WorkerEvent};
use crate::supervise::TaskSlot;

/// The one endpoint name subject to debouncing.
pub const PERSIST_ENDPOINT: &str = "/persist";

pub struct PersistenceWorker {
    inbox: mpsc::UnboundedReceiver<PersistenceRequest>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    state: Arc<PersistenceState>,
    debounce: Debouncer,
    startup_slot: TaskSlot,
    persist_slot: TaskSlot,
}

/// Message-passing handle to a running persistence worker.
pub struct PersistenceHandle {
    tx: mpsc::UnboundedSender<PersistenceRequest>,
    events: Option<mpsc::UnboundedReceiver<WorkerEvent>>,
    join: JoinHandle<()>,
}

impl PersistenceHandle {
    pub fn post(&self, msg: PersistenceRequest) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<PersistenceRequest> {
        self.tx.clone()
    }

    /// The outbound event stream. Available once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<WorkerEvent>> {
        self.events.take()
    }

    pub fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    /// Hard termination, the factory's last resort. Graceful teardown goes
    /// through `PersistenceRequest::Shutdown`.
    pub fn terminate(&self) {
        self.join.abort();
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }
}

struct PersistenceState {
    cfg: SyncConfig,
    http: Client,
    tracker: ExecutionTracker,
    store: Mutex<StoreSlot>,
    ready: watch::Sender<bool>,
    paused: watch::Sender<bool>,
    /// Last successfully assembled snapshot, the delta baseline.
    baseline: Mutex<Value>,
}

#[derive(Default)]
struct StoreSlot {
    name: Option<String>,
    db: Option<TenantDb>,
}

impl PersistenceWorker {
    /// Spawns the worker task and returns its handle.
    pub fn spawn(cfg: SyncConfig) -> PersistenceHandle {
        let (tx, inbox) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = Self::new(cfg, inbox, event_tx);
        let join = tokio::spawn(worker.run());
        PersistenceHandle {
            tx,
            events: Some(event_rx),
            join,
        }
    }

    fn new(
        cfg: SyncConfig,
        inbox: mpsc::UnboundedReceiver<PersistenceRequest>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        let debounce = Debouncer::new(cfg.debounce_window, [PERSIST_ENDPOINT]);
        Self {
            inbox,
            events,
            state: Arc::new(PersistenceState {
                cfg,
                http: Client::new(),
                tracker: ExecutionTracker::new(),
                store: Mutex::new(StoreSlot::default()),
                ready: watch::channel(false).0,
                paused: watch::channel(false).0,
                baseline: Mutex::new(Value::Object(Default::default())),
            }),
            debounce,
            startup_slot: TaskSlot::new(),
            persist_slot: TaskSlot::new(),
        }
    }

    /// Root dispatch loop. Runs until a shutdown message arrives or the
    /// inbox closes; children are torn down on exit.
    pub async fn run(mut self) {
        while let Some(msg) = self.inbox.recv().await {
            match msg {
                PersistenceRequest::Startup { idb } => {
                    let state = self.state.clone();
                    self.startup_slot
                        .spawn_leading(async move { state.startup(idb).await });
                }
                PersistenceRequest::Persist => {
                    if self.debounce.admit(PERSIST_ENDPOINT) == Admission::Drop {
                        debug!("persist trigger dropped by debounce window");
                        continue;
                    }
                    let state = self.state.clone();
                    let spawned = self.persist_slot.spawn_leading(async move {
                        if let Err(err) = state.persist_cycle().await {
                            warn!("persist cycle failed: {err:#}");
                        }
                    });
                    if !spawned {
                        debug!("persist already in progress, dropping trigger");
                    }
                }
                PersistenceRequest::Pause => self.state.set_paused(true),
                PersistenceRequest::Resume => self.state.set_paused(false),
                PersistenceRequest::AbortWork => self.state.tracker.abort_all(),
                PersistenceRequest::Ping => {
                    let _ = self.events.send(WorkerEvent::Pong("ok".into()));
                }
                PersistenceRequest::Shutdown { force } => {
                    self.state.shutdown(force).await;
                    let _ = self.events.send(WorkerEvent::Shutdown("ok".into()));
                    break;
                }
            }
        }
        self.startup_slot.abort();
        self.persist_slot.abort();
    }
}

impl PersistenceState {
    /// Derives and opens the tenant-scoped database. Fails loudly: an invalid
    /// tenant key or an unopenable database leaves no usable handle behind.
    async fn startup(&self, name: String) {
        {
            let store = self.store.lock().await;
            if store.db.is_some() && store.name.as_deref() == Some(name.as_str()) {
                return;
            }
        }
        match TenantDb::open(&self.cfg.db_root, &name).await {
            Ok(db) => {
                let mut store = self.store.lock().await;
                // a tenant switch must not leak the displaced pool
                if let Some(old) = store.db.take() {
                    old.close().await;
                }
                store.name = Some(name.clone());
                store.db = Some(db);
                drop(store);
                self.ready.send_replace(true);
                info!(%name, "tenant database opened");
            }
            Err(err) => {
                error!(%name, "failed to open tenant database: {err}");
            }
        }
    }

    /// One diff-and-upload cycle. Serialized by the dispatch loop's leading
    /// slot, so two cycles never overlap.
    async fn persist_cycle(&self) -> anyhow::Result<()> {
        self.wait_unpaused().await;
        self.wait_ready().await;

        let (db, name) = {
            let store = self.store.lock().await;
            match (&store.db, &store.name) {
                (Some(db), Some(name)) => (db.clone(), name.clone()),
                _ => {
                    warn!("tenant database not open, skipping persist");
                    return Ok(());
                }
            }
        };

        // Prior timestamp decides full vs delta; the fresh stamp lands before
        // the snapshot is read so hydration staleness checks see this write.
        let prev_timestamp = BlockMeta::read_timestamp(&db).await?;
        let meta = BlockMeta::now(&name);
        meta.write_to(&db).await?;

        let Some(mut snapshot) = db.get(Partition::Raw, SNAPSHOT_KEY).await? else {
            warn!(tenant = %name, "no snapshot to persist");
            return Ok(());
        };
        if let Value::Object(map) = &mut snapshot {
            map.insert(BLOCK_META_FIELD.to_string(), serde_json::to_value(&meta)?);
        }

        if prev_timestamp.is_none() {
            let url = format!("{}/persitor/v2/full/{}", self.cfg.base_url, name);
            let result = bounded_fetch(
                &self.http,
                &self.tracker,
                FetchRequest {
                    method: Method::POST,
                    url,
                    body: Some(&snapshot),
                    timeout: self.cfg.fetch_timeout,
                },
            )
            .await;
            match result {
                Ok(_) => info!(tenant = %name, "full snapshot uploaded"),
                Err(err) => warn!(tenant = %name, "full snapshot upload failed: {err}"),
            }
            *self.baseline.lock().await = snapshot;
            return Ok(());
        }

        let delta = {
            let mut baseline = self.baseline.lock().await;
            let delta = diff::diff(&baseline, &snapshot);
            *baseline = snapshot;
            delta
        };
        let Some(delta) = delta else {
            debug!(tenant = %name, "snapshot unchanged, skipping upload");
            return Ok(());
        };
        if diff::is_meta_only(&delta) {
            debug!(tenant = %name, "only block metadata changed, skipping upload");
            return Ok(());
        }

        let url = format!("{}/persitor/v2/delta/{}", self.cfg.base_url, name);
        if let Err(err) = bounded_fetch(
            &self.http,
            &self.tracker,
            FetchRequest {
                method: Method::POST,
                url,
                body: Some(&delta),
                timeout: self.cfg.fetch_timeout,
            },
        )
        .await
        {
            warn!(tenant = %name, "delta upload failed: {err}");
        }
        Ok(())
    }

    fn set_paused(&self, value: bool) {
        self.paused.send_replace(value);
    }

    async fn wait_unpaused(&self) {
        let mut rx = self.paused.subscribe();
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Two-phase teardown: a bounded grace period for in-flight work, forced
    /// abort of the rest, then the database handle is closed and the
    /// remembered tenant state cleared.
    async fn shutdown(&self, force: bool) {
        if !force {
            tokio::select! {
                _ = self.tracker.wait_settled(self.cfg.settle_poll) => {}
                _ = tokio::time::sleep(self.cfg.shutdown_grace) => {
                    warn!("shutdown grace elapsed with work still in flight");
                }
            }
        }
        self.tracker.abort_all();
        let mut store = self.store.lock().await;
        if let Some(db) = store.db.take() {
            db.close().await;
        }
        store.name = None;
        drop(store);
        self.ready.send_replace(false);
    }
}
