//! Bounded retry with exponential backoff for transient-classified
//! retrieval I/O (§4.4, §7), built on the budgets in
//! `horei_config::constants::retry`/`timeouts`.
//!
//! Mirrors `OllamaBackend::generate`'s retry loop in `horei-llm`, but as a
//! reusable wrapper since the vector/embedding/graph call sites are plain
//! ports rather than a single owned backend.

use std::future::Future;
use std::time::Duration;

use horei_config::constants::retry;
use horei_core::Error as CoreError;

/// Run `op` under `timeout`, retrying up to `retry::MAX_ATTEMPTS` times with
/// backoff starting at `retry::INITIAL_BACKOFF` and capped at
/// `retry::MAX_BACKOFF`. Stops immediately on a non-retryable error; a
/// timed-out attempt is treated as `Error::Timeout`, which is retryable.
pub async fn with_retry<F, Fut, T>(timeout: Duration, mut op: F) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut backoff = retry::INITIAL_BACKOFF;
    let mut last_err = None;

    for attempt in 0..retry::MAX_ATTEMPTS {
        let result = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout(format!("exceeded {timeout:?}"))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable_class() => return Err(err),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "retryable failure, retrying");
                last_err = Some(err);
                if attempt + 1 < retry::MAX_ATTEMPTS {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(retry::MAX_BACKOFF);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| CoreError::transient("exhausted retry attempts")))
}
