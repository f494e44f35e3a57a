//! Bounded retries for transient oracle failures.
//!
//! The agent loop never retries on its own; clients wrap their network call
//! in [`with_retries`] instead.

use cartloop_core::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op` up to `max_retries + 1` times, sleeping `backoff * attempt`
/// between attempts. Only errors where [`ProviderError::is_transient`]
/// holds are retried.
pub async fn with_retries<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = match &e {
                    ProviderError::RateLimited { retry_after_secs } => {
                        Duration::from_secs(*retry_after_secs).max(backoff * attempt)
                    }
                    _ => backoff * attempt,
                };
                warn!(
                    attempt,
                    max_retries,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
