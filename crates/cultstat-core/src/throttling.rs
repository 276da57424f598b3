use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

/// Outbound request budget shared by every GraphQL call of a coordinator.
///
/// Never waits: a request that finds no budget is refused with the time until
/// the next cell frees up, and the caller gives up until the next cycle.
#[derive(Clone)]
pub struct RequestBudget {
    limiter: Arc<DirectRateLimiter>,
    requests_per_minute: u32,
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

impl RequestBudget {
    pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;

    pub fn per_minute(requests_per_minute: u32) -> Self {
        let limit = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(limit))),
            requests_per_minute: limit.get(),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Takes one request from the budget, or returns how long until one is free.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::per_minute(Self::DEFAULT_REQUESTS_PER_MINUTE)
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}
