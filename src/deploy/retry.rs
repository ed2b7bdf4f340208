// ABOUTME: Retry executor for remote calls that fail while IAM changes propagate.
// ABOUTME: Only the propagation error class is retried; everything else returns untouched.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::backend::{Classify, ErrorClass};
use crate::clock::Clock;

/// Retries after the first failure, so a call is attempted at most eight times.
pub const MAX_RETRIES: u32 = 7;

const FIRST_BACKOFF: Duration = Duration::from_millis(15_000);
const BASE_BACKOFF_MS: u64 = 1000;
/// Ceiling for any single wait, whatever retry number is asked for.
const MAX_BACKOFF_MS: u64 = 300_000;

/// Wait before retry number `retry` (1-based).
///
/// The first retry waits 15s; retry `n >= 2` waits `1000 * 2^(n-2)` ms,
/// capped at five minutes.
pub fn backoff_delay(retry: u32) -> Duration {
    if retry <= 1 {
        return FIRST_BACKOFF;
    }
    let factor = 1u64.checked_shl(retry - 2).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// Run `op`, retrying while it fails with [`ErrorClass::PermissionPropagating`].
///
/// The final error is returned as-is, without wrapping.
pub async fn with_retry<T, E, F, Fut>(clock: &dyn Clock, description: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.class() == ErrorClass::PermissionPropagating && retries < MAX_RETRIES => {
                retries += 1;
                let delay = backoff_delay(retries);
                tracing::warn!(
                    call = description,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "API [{description}] not yet enabled or permissions propagating: {err}"
                );
                clock.sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
