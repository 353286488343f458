#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;
use tokio::sync::mpsc;

use libsyncer::WorkerEvent;

/// In-process stand-in for the remote store.
pub struct RemoteStub {
    pub base_url: String,
    pub state: Arc<StubState>,
}

#[derive(Default)]
pub struct StubState {
    pub full: Mutex<Vec<(String, Value)>>,
    pub delta: Mutex<Vec<(String, Value)>>,
    pub down: Mutex<HashMap<String, DownReply>>,
    /// Artificial latency applied to uploads before they are recorded.
    pub upload_delay: Mutex<Option<Duration>>,
    /// When set, uploads are rejected with this status and not recorded.
    pub upload_status: Mutex<Option<u16>>,
    /// Artificial latency applied to downloads before they are served.
    pub down_delay: Mutex<Option<Duration>>,
    /// Upload requests that reached the handler, recorded before the delay.
    pub uploads_started: AtomicUsize,
}

impl StubState {
    pub fn full_count(&self) -> usize {
        self.full.lock().unwrap().len()
    }

    pub fn delta_count(&self) -> usize {
        self.delta.lock().unwrap().len()
    }
}

#[derive(Clone)]
pub enum DownReply {
    Plain(Value),
    Gzip(Value),
    Error(u16),
}

pub async fn start_stub() -> RemoteStub {
    let state = Arc::new(StubState::default());
    let app = Router::new()
        .route("/persitor/v2/full/{tenant}", post(full_upload))
        .route("/persitor/v2/delta/{tenant}", post(delta_upload))
        .route("/persitor/v3/down/{tenant}", post(download))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    RemoteStub {
        base_url: format!("http://{addr}"),
        state,
    }
}

async fn full_upload(
    State(state): State<Arc<StubState>>,
    Path(tenant): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state
        .uploads_started
        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    if let Some(code) = *state.upload_status.lock().unwrap() {
        return StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }
    let delay = *state.upload_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    state.full.lock().unwrap().push((tenant, body));
    Json(serde_json::json!({"ok": true})).into_response()
}

async fn delta_upload(
    State(state): State<Arc<StubState>>,
    Path(tenant): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state
        .uploads_started
        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    if let Some(code) = *state.upload_status.lock().unwrap() {
        return StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }
    let delay = *state.upload_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    state.delta.lock().unwrap().push((tenant, body));
    Json(serde_json::json!({"ok": true})).into_response()
}

async fn download(State(state): State<Arc<StubState>>, Path(tenant): Path<String>) -> Response {
    let delay = *state.down_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let reply = state.down.lock().unwrap().get(&tenant).cloned();
    match reply {
        Some(DownReply::Plain(value)) => Json(value).into_response(),
        Some(DownReply::Gzip(value)) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&serde_json::to_vec(&value).expect("encode stub body"))
                .expect("gzip stub body");
            let bytes = encoder.finish().expect("finish gzip");
            (
                [
                    (header::CONTENT_ENCODING, "gzip"),
                    (header::CONTENT_TYPE, "application/json"),
                ],
                bytes,
            )
                .into_response()
        }
        Some(DownReply::Error(code)) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Polls `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<WorkerEvent>,
    timeout: Duration,
) -> Option<WorkerEvent> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}
