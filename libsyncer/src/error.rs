use std::time::Duration;

use thiserror::Error;

/// Failure of one bounded network operation. Timeouts and aborts are ordinary
/// outcomes here, not panics: the caller logs them and moves on, the next
/// persist trigger or hydration request being the retry path.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("request aborted")]
    Aborted,

    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("decompression error: {0}")]
    Decompress(#[from] std::io::Error),
}
