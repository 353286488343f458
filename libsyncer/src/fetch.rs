//! Bounded network fetch: one HTTP request raced against a timeout and the
//! worker's abort signal. The execution guard is held for the whole call, so
//! shutdown accounting stays correct on success, error and abort alike.

use std::io::Write;
use std::time::Duration;

use flate2::write::GzDecoder;
use reqwest::{Client, Method, header};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::exec::ExecutionTracker;

pub struct FetchRequest<'a> {
    pub method: Method,
    pub url: String,
    pub body: Option<&'a Value>,
    pub timeout: Duration,
}

/// Issues the request and returns the decoded JSON body, or a failure result.
/// On timeout or abort the underlying request future is dropped, which tears
/// the connection down.
pub async fn bounded_fetch(
    client: &Client,
    tracker: &ExecutionTracker,
    request: FetchRequest<'_>,
) -> Result<Value, FetchError> {
    let guard = tracker.register();
    let token = guard.token().clone();
    tokio::select! {
        res = send(client, &request) => res,
        _ = token.cancelled() => {
            debug!(url = %request.url, "request aborted");
            Err(FetchError::Aborted)
        }
        _ = tokio::time::sleep(request.timeout) => {
            debug!(url = %request.url, timeout = ?request.timeout, "request timed out");
            Err(FetchError::TimedOut(request.timeout))
        }
    }
}

async fn send(client: &Client, request: &FetchRequest<'_>) -> Result<Value, FetchError> {
    let mut builder = client
        .request(request.method.clone(), &request.url)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT_ENCODING, "gzip");
    if let Some(body) = request.body {
        builder = builder.json(body);
    }
    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let gzipped = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));
    if !gzipped {
        return Ok(response.json().await?);
    }

    // Feed the body into the decoder chunk by chunk until end-of-stream.
    let mut response = response;
    let mut decoder = GzDecoder::new(Vec::new());
    while let Some(chunk) = response.chunk().await? {
        decoder.write_all(&chunk)?;
    }
    let decompressed = decoder.finish()?;
    Ok(serde_json::from_slice(&decompressed)?)
}
