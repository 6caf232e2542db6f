//! Resilient HTTP fetching with bounded retries
//!
//! One retry loop serves both the locator's landing-page fetch and the file
//! download: exponential backoff with up to 50% jitter, a configurable delay
//! ceiling, and a hard distinction between retryable statuses and fatal
//! ones. The backoff wait honors cancellation immediately.

use rand::Rng;
use reqwest::{Client, StatusCode, Url};
use std::io::Cursor;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{FetchFailure, IngestError};

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default ceiling for a single backoff delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry behavior shared by the locator and the fetcher.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts (first try included); at least 1.
    pub max_attempts: u32,

    /// Cap applied to each computed backoff delay.
    pub max_delay: Duration,

    /// Backoff time unit. The delay before re-attempting after attempt `n`
    /// is `base_delay * 2^n * (1 + jitter)`. One second in production;
    /// tests shrink it.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: DEFAULT_MAX_BACKOFF,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Statuses expected to be transient: worth a bounded retry with backoff.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Backoff delay after failed attempt `attempt` (1-based).
///
/// `jitter` is a uniform draw from `[0, 0.5)` supplied by the caller so the
/// formula itself stays deterministic and testable.
pub fn backoff_delay(attempt: u32, jitter: f64, config: &RetryConfig) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let delay = config.base_delay.mul_f64(exp as f64 * (1.0 + jitter));
    delay.min(config.max_delay)
}

/// Fetch `url` and return the full response body, retrying transient
/// failures up to the configured attempt budget.
///
/// A 2xx response ends the loop. Retryable statuses and transport-level
/// errors (timeouts, resets, interrupted body reads) trigger a jittered
/// backoff then a re-attempt; any other non-success status is fatal and
/// aborts immediately. Exhausting the budget surfaces the last cause.
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    config: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, IngestError> {
    let mut last_failure = FetchFailure::NoAttempts;

    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        debug!(%url, attempt, max_attempts = config.max_attempts, "fetch attempt");

        match client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.bytes().await {
                        Ok(body) => {
                            debug!(%url, bytes = body.len(), "fetch succeeded");
                            return Ok(body.to_vec());
                        }
                        // The connection dropped mid-body; transport-level,
                        // so retryable like any other network fault.
                        Err(e) => last_failure = FetchFailure::Transport(e),
                    }
                } else if is_retryable_status(status) {
                    last_failure = FetchFailure::Status(status);
                } else {
                    return Err(IngestError::FatalStatus {
                        url: url.to_string(),
                        status,
                    });
                }
            }
            Err(e) => last_failure = FetchFailure::Transport(e),
        }

        if attempt < config.max_attempts {
            let jitter = rand::thread_rng().gen_range(0.0..0.5);
            let delay = backoff_delay(attempt, jitter, config);
            warn!(
                %url,
                attempt,
                max_attempts = config.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_failure,
                "fetch attempt failed, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(IngestError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    Err(IngestError::RetriesExhausted {
        url: url.to_string(),
        attempts: config.max_attempts,
        source: last_failure,
    })
}

/// Downloads a source file into a seekable, position-reset byte buffer.
///
/// The parser needs to seek during header inspection (BOM probing), so the
/// whole body is buffered rather than streamed.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    client: Client,
    retry: RetryConfig,
}

impl FileFetcher {
    pub fn new(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Download the full file at `url`, returning a cursor positioned at 0.
    pub async fn download(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Cursor<Vec<u8>>, IngestError> {
        let bytes = fetch_with_retry(&self.client, url, &self.retry, cancel).await?;
        info!(%url, bytes = bytes.len(), "downloaded source file");
        Ok(Cursor::new(bytes))
    }
}
