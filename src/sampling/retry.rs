use log::{debug, trace};
use std::future::Future;
use std::time::Duration;

use crate::peripherals::Clock;

/// Bounded polling: probe up to `max_attempts` times, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Longest time the policy can spend waiting.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }

    /// Poll `probe` until it reports ready, returning `on_timeout` once the
    /// attempts are used up. Waits go through `clock` so tests can simulate them.
    pub async fn poll_until<C, F, Fut, E>(&self, clock: &C, mut probe: F, on_timeout: E) -> Result<(), E>
    where
        C: Clock,
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for attempt in 0..self.max_attempts {
            if probe().await {
                return Ok(());
            }
            trace!("Not ready after attempt {}/{}", attempt + 1, self.max_attempts);
            if attempt + 1 < self.max_attempts {
                clock.delay(self.interval).await;
            }
        }
        debug!("Gave up polling after {:?}", self.budget());
        Err(on_timeout)
    }
}
