// ABOUTME: Time source for every wait in the pipeline.
// ABOUTME: Tests swap in a recording clock so polling and backoff run without real delay.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Sleeps and wall-clock reads used by retries, build polling and revision naming.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> DateTime<Utc>;
}

/// Real time, backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
