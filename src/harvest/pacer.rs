//! Rate limiting between page fetches
//!
//! A direct GCRA limiter with a burst of one: each cycle waits until at
//! least `min_cycle` has passed since the previous cycle started. A cycle
//! that already took longer is followed immediately by the next one, and
//! the overrun is not credited to later cycles.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::time::Duration;
use tracing::trace;

/// Minimum duration of one fetch/persist cycle
pub const MIN_CYCLE: Duration = Duration::from_secs(1);

pub struct Pacer {
    /// `None` when pacing is disabled (zero cycle)
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    min_cycle: Duration,
}

impl Pacer {
    pub fn new(min_cycle: Duration) -> Self {
        let rate_limiter = Quota::with_period(min_cycle).map(RateLimiter::direct);
        Self {
            rate_limiter,
            min_cycle,
        }
    }

    pub fn min_cycle(&self) -> Duration {
        self.min_cycle
    }

    /// Wait for the start of the next cycle
    ///
    /// The first call returns immediately.
    pub async fn until_ready(&self) {
        if let Some(rate_limiter) = &self.rate_limiter {
            if rate_limiter.check().is_err() {
                trace!(min_cycle_ms = self.min_cycle.as_millis() as u64, "Pacing before next fetch");
                rate_limiter.until_ready().await;
            }
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(MIN_CYCLE)
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("min_cycle", &self.min_cycle)
            .finish()
    }
}
