//! Pacing for batch jobs that call the external platform.

use crate::settings::ThrottleSettings;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::time::Duration;

/// One call per interval, plus a longer pause after every batch.
pub struct Throttle {
    limiter: Option<DefaultDirectRateLimiter>,
    batch_size: usize,
    batch_pause: Duration,
    processed: usize,
}

impl Throttle {
    pub fn new(settings: &ThrottleSettings) -> Self {
        let limiter = Quota::with_period(settings.interval()).map(RateLimiter::direct);
        Self {
            limiter,
            batch_size: settings.batch_size,
            batch_pause: settings.batch_pause(),
            processed: 0,
        }
    }

    /// Wait until the next call may go out.
    pub async fn ready(&mut self) {
        if self.batch_size > 0 && self.processed > 0 && self.processed % self.batch_size == 0 {
            tokio::time::sleep(self.batch_pause).await;
        }
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        self.processed += 1;
    }

    pub fn processed(&self) -> usize {
        self.processed
    }
}
