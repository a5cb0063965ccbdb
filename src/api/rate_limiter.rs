// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WARFRAME.MARKET API RATE LIMITING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// The public API allows 3 requests per second per client. Exceeding it
// gets requests rejected with 429 and repeated abuse gets the IP banned.
// Every outbound marketplace call goes through `RateLimiter::acquire`,
// regardless of the configured poll interval.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::core::{Clock, Config, TokioClock};

const MARKET_MAX_REQUESTS: usize = 3;
const MARKET_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: MARKET_MAX_REQUESTS,
            window: MARKET_WINDOW,
        }
    }
}

impl From<&Config> for RateLimiterConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_requests: config.rate_limit_requests,
            window: config.rate_limit_window(),
        }
    }
}

/// Sliding-window limiter: at most `max_requests` acquisitions in any `window`.
pub struct RateLimiter {
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
    request_times: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    pub fn with_clock(mut config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        config.max_requests = config.max_requests.max(1);

        tracing::info!(
            "🛡️  Rate limiter: {} requests per {:?}",
            config.max_requests,
            config.window
        );

        Self {
            request_times: Mutex::new(VecDeque::with_capacity(config.max_requests)),
            config,
            clock,
        }
    }

    /// Waits until one more request fits in the window, then records it.
    pub async fn acquire(&self) {
        // Held across the wait so concurrent callers queue up in FIFO order.
        let mut times = self.request_times.lock().await;

        loop {
            let now = self.clock.now();
            Self::evict_expired(&mut times, now, self.config.window);

            if times.len() < self.config.max_requests {
                times.push_back(now);
                return;
            }

            let Some(&oldest) = times.front() else {
                continue;
            };
            let wait = (oldest + self.config.window).saturating_duration_since(now);
            tracing::debug!("⏳ Rate limit reached, waiting {:?}", wait);
            self.clock.sleep(wait).await;
        }
    }

    fn evict_expired(times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&front) = times.front() {
            if now.saturating_duration_since(front) >= window {
                times.pop_front();
            } else {
                break;
            }
        }
    }

    pub async fn current_usage(&self) -> usize {
        let times = self.request_times.lock().await;
        let now = self.clock.now();

        times
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < self.config.window)
            .count()
    }

    pub async fn available_capacity(&self) -> usize {
        let usage = self.current_usage().await;
        self.config.max_requests.saturating_sub(usage)
    }

    pub fn max_requests(&self) -> usize {
        self.config.max_requests
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }
}
