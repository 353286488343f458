//! Execution-handle tracking: every in-flight network operation registers a
//! cancellation token here, and membership is what shutdown sequencing waits
//! on. Deregistration is RAII so that every exit path, including aborts,
//! keeps the accounting accurate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct ExecutionTracker {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    live: HashMap<u64, CancellationToken>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new in-flight operation. Dropping the guard removes it.
    pub fn register(&self) -> ExecutionGuard {
        let token = CancellationToken::new();
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.live.insert(id, token.clone());
            id
        };
        ExecutionGuard {
            id,
            token,
            tracker: self.clone(),
        }
    }

    /// Signals cancellation on every tracked operation.
    pub fn abort_all(&self) {
        for token in self.inner.lock().unwrap().live.values() {
            token.cancel();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().unwrap().live.len()
    }

    /// Polls until the set drains. Bounded by the caller's select.
    pub async fn wait_settled(&self, poll: Duration) {
        while self.in_flight() > 0 {
            tokio::time::sleep(poll).await;
        }
    }

    fn remove(&self, id: u64) {
        self.inner.lock().unwrap().live.remove(&id);
    }
}

pub struct ExecutionGuard {
    id: u64,
    token: CancellationToken,
    tracker: ExecutionTracker,
}

impl ExecutionGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.tracker.remove(self.id);
    }
}
