//! Outbound request pacing.
//!
//! The cycle awaits [`RateLimiter::acquire`] before each file.
//! Swapping the gate (e.g. for adaptive backoff) does not touch pipeline code.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the next unit of work may start.
    async fn acquire(&self);
}

/// Enforces a minimum interval between successive acquisitions.
/// The first acquisition never waits.
pub struct MinIntervalGate {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for MinIntervalGate {
    async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                debug!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "rate gate sleeping");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// No pacing at all.
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self) {}
}
