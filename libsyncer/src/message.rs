//! Worker inbox/outbox protocol: `{type, payload}` envelopes discriminated by
//! a `type` string.

use serde::{Deserialize, Serialize};

/// Inbound messages understood by the persistence worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PersistenceRequest {
    /// Opens the tenant-scoped database. Must arrive before any persist can
    /// resolve a handle.
    #[serde(rename = "/startup")]
    Startup { idb: String },

    /// Debounced diff-and-upload cycle.
    #[serde(rename = "/persist")]
    Persist,

    #[serde(rename = "/pause")]
    Pause,

    #[serde(rename = "/resume")]
    Resume,

    /// Cancels every in-flight network operation.
    #[serde(rename = "/abortWork")]
    AbortWork,

    #[serde(rename = "/shutdown")]
    Shutdown {
        #[serde(default)]
        force: bool,
    },

    #[serde(rename = "/ping")]
    Ping,
}

/// Inbound messages understood by the hydration worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum HydrationRequest {
    /// Triggers the one-shot download for a tenant file name. Latest-wins:
    /// a new call supersedes any in-flight one.
    #[serde(rename = "/start")]
    Start(String),

    #[serde(rename = "/abortWork")]
    AbortWork,

    #[serde(rename = "/shutdown")]
    Shutdown {
        message: String,
        #[serde(default)]
        force: bool,
    },

    #[serde(rename = "/ping")]
    Ping,
}

/// Outbound messages a worker posts to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WorkerEvent {
    /// Persistence worker finished its teardown.
    #[serde(rename = "shutdown")]
    Shutdown(String),

    /// Hydration worker is done and asks to be terminated.
    #[serde(rename = "/terminate")]
    Terminate(String),

    #[serde(rename = "/pong")]
    Pong(String),
}
