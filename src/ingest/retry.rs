use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Base delay; attempt `n` (1-based) that fails waits `n * BACKOFF_STEP` before the next one
pub const BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Run `work` up to `retries + 1` times with linear backoff.
///
/// The executor does not inspect the error: decode, validation and sink
/// failures are all retried the same way. When the last attempt fails its
/// error is returned to the caller.
pub async fn run_with_retry<T, E, F, Fut>(retries: u32, mut work: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match work().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt > retries {
                    return Err(e);
                }
                let delay = BACKOFF_STEP * attempt;
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Attempt failed, backing off");
                sleep(delay).await;
            }
        }
    }
}
