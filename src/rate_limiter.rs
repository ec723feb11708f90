//! Multi-window token bucket limiter shared by every Riot API call.
//!
//! Riot enforces a short burst limit and a longer sustained limit at the same
//! time, so a request is only granted once every bucket can pay for it.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{trace, warn};

const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, window: Duration, now: Instant) -> Self {
        let capacity = f64::from(capacity.max(1));
        let window = window.as_secs_f64().max(f64::EPSILON);

        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / window,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    fn wait_for(&self, cost: f64) -> Duration {
        if self.tokens >= cost {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((cost - self.tokens) / self.refill_per_sec)
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<Vec<TokenBucket>>,
    max_cost: u32,
}

impl RateLimiter {
    /// Builds a limiter from `(capacity, window)` pairs.
    pub fn new(limits: &[(u32, Duration)]) -> Self {
        let now = Instant::now();
        let buckets: Vec<_> = limits
            .iter()
            .map(|(capacity, window)| TokenBucket::new(*capacity, *window, now))
            .collect();
        let max_cost = limits
            .iter()
            .map(|(capacity, _)| (*capacity).max(1))
            .min()
            .unwrap_or(u32::MAX);

        Self {
            buckets: Mutex::new(buckets),
            max_cost,
        }
    }

    /// Riot development/production style limits: a per second burst and a
    /// per two minutes budget.
    pub fn riot(per_second: u32, per_two_minutes: u32) -> Self {
        Self::new(&[
            (per_second, Duration::from_secs(1)),
            (per_two_minutes, Duration::from_secs(120)),
        ])
    }

    /// Waits until `cost` tokens are available in every bucket and consumes
    /// them. Never fails.
    pub async fn acquire(&self, cost: u32) {
        let cost = if cost > self.max_cost {
            warn!(cost, max = self.max_cost, "⏳ Request cost above bucket capacity, clamping");
            self.max_cost
        } else {
            cost
        };
        let cost = f64::from(cost);

        loop {
            let wait = {
                let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();

                buckets.iter_mut().for_each(|b| b.refill(now));

                if buckets.iter().all(|b| b.tokens >= cost) {
                    buckets.iter_mut().for_each(|b| b.tokens -= cost);
                    return;
                }

                buckets
                    .iter()
                    .map(|b| b.wait_for(cost))
                    .max()
                    .unwrap_or(Duration::ZERO)
                    .max(MIN_WAIT)
            };

            trace!(wait_ms = wait.as_millis() as u64, "⏳ Waiting for rate limit capacity");
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn burst_is_granted_immediately() {
        let limiter = RateLimiter::riot(20, 100);
        let start = Instant::now();

        for _ in 0..20 {
            limiter.acquire(1).await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn short_window_delays_the_next_call() {
        let limiter = RateLimiter::riot(2, 100);
        let start = Instant::now();

        limiter.acquire(1).await;
        limiter.acquire(1).await;
        limiter.acquire(1).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn both_windows_are_enforced() {
        let limiter = RateLimiter::riot(2, 3);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire(1).await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        // The long bucket is empty and refills one token every 40s.
        limiter.acquire(1).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(39_900), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(42), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_cost_is_clamped() {
        let limiter = RateLimiter::riot(5, 100);

        limiter.acquire(50).await;

        let buckets = limiter.buckets.lock().unwrap();
        assert!(buckets[0].tokens < 1.0);
        assert!((buckets[1].tokens - 95.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_exceed_capacity() {
        let limiter = Arc::new(RateLimiter::riot(5, 12));
        let start = Instant::now();
        let mut handles = Vec::new();

        for i in 0..30 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire(1 + (i % 2)).await;
                (start.elapsed(), 1 + (i % 2))
            }));
        }

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }

        let buckets: Vec<(f64, f64)> = limiter
            .buckets
            .lock()
            .unwrap()
            .iter()
            .map(|b| (b.capacity, b.refill_per_sec))
            .collect();

        // Every bucket starts full, so by time `t` it can have paid for at
        // most its capacity plus what refilled since the start.
        for (at, _) in &grants {
            let granted: u32 = grants
                .iter()
                .filter(|(other, _)| other <= at)
                .map(|(_, cost)| *cost)
                .sum();
            for (capacity, refill_per_sec) in &buckets {
                let budget = capacity + refill_per_sec * at.as_secs_f64();
                assert!(
                    f64::from(granted) <= budget + 1e-6,
                    "{granted} tokens granted by {at:?}, budget {budget}"
                );
            }
        }

        // The long bucket pays 12 up front then refills 0.1 token per second.
        let last = grants.iter().map(|(at, _)| *at).max().unwrap();
        assert!(last >= Duration::from_millis(329_999), "{last:?}");

        let total: u32 = grants.iter().map(|(_, cost)| *cost).sum();
        assert_eq!(total, 45);
    }
}
