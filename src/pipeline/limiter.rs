use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Sliding-window rate limiter for outbound model calls.
///
/// Keeps the timestamps of calls made within the trailing window. `acquire`
/// suspends until capacity is available, re-checking after each wait rather
/// than sleeping once, so bursts under heavy contention still drain in FIFO
/// admission order.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a call slot is available, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait_until = {
                let mut timestamps = self.timestamps.lock().expect("rate limiter lock poisoned");
                let now = Instant::now();

                while let Some(&oldest) = timestamps.front() {
                    if now.duration_since(oldest) >= self.window {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }

                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    return;
                }

                // Full window: wait for the oldest stamp to expire, then
                // re-check, since another waiter may claim the slot first.
                let oldest = *timestamps.front().expect("non-empty window");
                oldest + self.window
            };

            debug!(
                wait_ms = wait_until.saturating_duration_since(Instant::now()).as_millis(),
                "Rate limit reached, waiting for window"
            );
            sleep_until(wait_until).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_limit_is_immediate() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_call_waits_for_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_refills_after_expiry() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(1100)).await;

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
