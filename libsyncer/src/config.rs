use std::path::PathBuf;
use std::time::Duration;

/// Runtime knobs shared by both workers.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote store.
    pub base_url: String,
    /// Directory holding the tenant-scoped database files.
    pub db_root: PathBuf,
    /// Persist coalescing window: the first trigger within a window executes,
    /// the rest are dropped.
    pub debounce_window: Duration,
    /// Upper bound on any single network operation.
    pub fetch_timeout: Duration,
    /// How long a non-forced shutdown waits for in-flight work to settle.
    pub shutdown_grace: Duration,
    /// Poll interval while waiting for the execution-handle set to drain.
    pub settle_poll: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4000".to_string(),
            db_root: PathBuf::from("."),
            debounce_window: Duration::from_millis(1000),
            fetch_timeout: Duration::from_millis(5000),
            shutdown_grace: Duration::from_millis(3000),
            settle_poll: Duration::from_millis(32),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden from `SYNC_SERVICE_URL` / `SYNC_DB_ROOT` when set.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var("SYNC_SERVICE_URL") {
            cfg.base_url = url;
        }
        if let Ok(root) = std::env::var("SYNC_DB_ROOT") {
            cfg.db_root = PathBuf::from(root);
        }
        cfg
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_db_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.db_root = root.into();
        self
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
