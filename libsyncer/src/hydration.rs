//! Hydration worker: one-shot download-and-install of a full remote snapshot
//! into a tenant's local database, then self-termination. `/start` is
//! latest-wins: a newer request supersedes an in-flight one.

use std::sync::Arc;

use reqwest::{Client, Method};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use libtenantdb::meta::{BLOCK_META_FIELD, BlockMeta, SNAPSHOT_KEY};
use libtenantdb::{Partition, TenantDb};

use crate::config::SyncConfig;
use crate::exec::ExecutionTracker;
use crate::fetch::{FetchRequest, bounded_fetch};
use crate::message::{HydrationRequest, WorkerEvent};
use crate::supervise::TaskSlot;

pub struct HydrationWorker {
    inbox: mpsc::UnboundedReceiver<HydrationRequest>,
    state: Arc<HydrationState>,
    start_slot: TaskSlot,
}

/// Message-passing handle to a running hydration worker.
pub struct HydrationHandle {
    tx: mpsc::UnboundedSender<HydrationRequest>,
    events: Option<mpsc::UnboundedReceiver<WorkerEvent>>,
    join: JoinHandle<()>,
}

impl HydrationHandle {
    pub fn post(&self, msg: HydrationRequest) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<HydrationRequest> {
        self.tx.clone()
    }

    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<WorkerEvent>> {
        self.events.take()
    }

    pub fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    pub fn terminate(&self) {
        self.join.abort();
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }
}

struct HydrationState {
    cfg: SyncConfig,
    http: Client,
    tracker: ExecutionTracker,
    events: mpsc::UnboundedSender<WorkerEvent>,
    /// Set once the worker has asked its owner to terminate it.
    done: CancellationToken,
}

impl HydrationWorker {
    pub fn spawn(cfg: SyncConfig) -> HydrationHandle {
        let (tx, inbox) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = Self {
            inbox,
            state: Arc::new(HydrationState {
                cfg,
                http: Client::new(),
                tracker: ExecutionTracker::new(),
                events: event_tx,
                done: CancellationToken::new(),
            }),
            start_slot: TaskSlot::new(),
        };
        let join = tokio::spawn(worker.run());
        HydrationHandle {
            tx,
            events: Some(event_rx),
            join,
        }
    }

    pub async fn run(mut self) {
        loop {
            let msg = tokio::select! {
                msg = self.inbox.recv() => msg,
                _ = self.state.done.cancelled() => break,
            };
            let Some(msg) = msg else { break };
            match msg {
                HydrationRequest::Start(file) => {
                    let state = self.state.clone();
                    self.start_slot.spawn_latest(async move {
                        let message = match state.download_and_install(&file).await {
                            Ok(()) => "ok",
                            Err(err) => {
                                warn!(tenant = %file, "hydration failed: {err:#}");
                                "error"
                            }
                        };
                        // nothing left to do here either way
                        state.shutdown(message, false).await;
                    });
                }
                HydrationRequest::AbortWork => self.state.tracker.abort_all(),
                HydrationRequest::Ping => {
                    let _ = self.state.events.send(WorkerEvent::Pong("ok".into()));
                }
                HydrationRequest::Shutdown { message, force } => {
                    self.state.shutdown(&message, force).await;
                    break;
                }
            }
        }
        self.start_slot.abort();
    }
}

impl HydrationState {
    async fn download_and_install(&self, file: &str) -> anyhow::Result<()> {
        let url = format!("{}/persitor/v3/down/{}", self.cfg.base_url, file);
        let data = bounded_fetch(
            &self.http,
            &self.tracker,
            FetchRequest {
                method: Method::POST,
                url,
                body: None,
                timeout: self.cfg.fetch_timeout,
            },
        )
        .await?;

        let db = TenantDb::open_for_peek(&self.cfg.db_root, file).await?;
        if let Some(meta) = data
            .get(BLOCK_META_FIELD)
            .and_then(|value| serde_json::from_value::<BlockMeta>(value.clone()).ok())
        {
            meta.write_to(&db).await?;
        }
        db.put(Partition::Raw, SNAPSHOT_KEY, &data).await?;
        info!(tenant = %file, "snapshot hydrated");
        Ok(())
    }

    /// Same two-phase semantics as the persistence worker, ending in a
    /// termination request to the owner.
    async fn shutdown(&self, message: &str, force: bool) {
        if !force {
            tokio::select! {
                _ = self.tracker.wait_settled(self.cfg.settle_poll) => {}
                _ = tokio::time::sleep(self.cfg.shutdown_grace) => {
                    warn!("shutdown grace elapsed with work still in flight");
                }
            }
        }
        self.tracker.abort_all();
        let _ = self.events.send(WorkerEvent::Terminate(message.to_string()));
        self.done.cancel();
    }
}
