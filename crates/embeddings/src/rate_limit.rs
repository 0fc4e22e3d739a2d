use crate::{EmbeddingError, Result};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Token bucket shared by every caller of one client.
///
/// Tokens accrue at `rate_per_sec` up to `burst`. A waiter reserves a token up front and sleeps
/// off any deficit, so concurrent waiters queue in reservation order instead of racing for the
/// next refill. A cancelled reservation is refunded.
#[derive(Debug)]
pub struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    updated: Instant,
}

impl TokenBucket {
    /// Bucket with `burst` capacity refilled at `rate_per_sec`. Starts full.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate_per_sec: rate_per_sec.max(f64::MIN_POSITIVE),
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                updated: Instant::now(),
            }),
        }
    }

    /// Bucket built from a requests-per-minute budget with a burst of one.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(f64::from(requests_per_minute.max(1)) / 60.0, 1)
    }

    pub fn rate_per_sec(&self) -> f64 {
        self.rate_per_sec
    }

    /// Block until a token is available or `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EmbeddingError::RateLimitWaitCanceled);
        }

        let delay = self.reserve();
        if delay.is_zero() {
            return Ok(());
        }

        log::trace!("rate limiter: waiting {delay:?} for a token");
        tokio::select! {
            _ = cancel.cancelled() => {
                self.refund();
                Err(EmbeddingError::RateLimitWaitCanceled)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn reserve(&self) -> Duration {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens -= 1.0;
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.rate_per_sec)
        }
    }

    fn refund(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens = (state.tokens + 1.0).min(self.burst);
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.updated).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
        state.updated = now;
    }
}
