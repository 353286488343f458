//! Task dispatch policies for message-triggered operations.
//!
//! `spawn_leading` is the one-shot policy: a call arriving while the previous
//! one still runs is dropped. `spawn_latest` is latest-wins: the in-flight
//! call is aborted and replaced. Every-call dispatch is plain `tokio::spawn`
//! and needs no slot.

use std::future::Future;

use tokio::task::JoinHandle;

#[derive(Default)]
pub struct TaskSlot {
    current: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Returns false when a previous call is still running and the new one
    /// was dropped.
    pub fn spawn_leading<F>(&mut self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        self.current = Some(tokio::spawn(fut));
        true
    }

    /// Aborts any in-flight call and runs the new one.
    pub fn spawn_latest<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(handle) = self.current.take()
            && !handle.is_finished()
        {
            handle.abort();
        }
        self.current = Some(tokio::spawn(fut));
    }

    pub fn abort(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }

    /// Waits for the in-flight call, if any, to finish or be aborted.
    pub async fn join(&mut self) {
        if let Some(handle) = self.current.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn leading_drops_calls_while_running() {
        let mut slot = TaskSlot::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        assert!(slot.spawn_leading(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = runs.clone();
        assert!(!slot.spawn_leading(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        slot.join().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let counter = runs.clone();
        assert!(slot.spawn_leading(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        slot.join().await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn latest_supersedes_the_running_call() {
        let mut slot = TaskSlot::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = finished.clone();
        slot.spawn_latest(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::task::yield_now().await;

        let counter = finished.clone();
        slot.spawn_latest(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        slot.join().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
