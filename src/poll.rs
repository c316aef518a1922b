//! Fixed-interval polling.
//!
//! The wait happens before every attempt, the first `Some` ends the loop, and
//! running out of attempts is reported as [`PollExhausted`]. Timing goes
//! through `tokio::time`, so a paused runtime clock drives it in tests.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gave up after {attempts} attempts")]
pub struct PollExhausted {
    pub attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Calls `probe` with the 1-based attempt number until it yields a value.
    pub async fn run<T, F, Fut>(&self, mut probe: F) -> Result<T, PollExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;
            if let Some(found) = probe(attempt).await {
                debug!(attempt, "poll succeeded");
                return Ok(found);
            }
            debug!(attempt, max = self.max_attempts, "poll not ready");
        }
        Err(PollExhausted {
            attempts: self.max_attempts,
        })
    }
}
