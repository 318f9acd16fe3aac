//! Token-bucket rate limiter for tracker writes
//!
//! All outbound writes acquire one token before issuing. The token count is
//! a float so partial refills carry forward; refill is capped at the burst
//! size. A waiter computes its sleep optimistically and re-refills after
//! waking, so racing waiters each recompute on their own.

use tokio::time::{Duration, Instant, sleep};

#[derive(Debug)]
pub struct TokenBucket {
    per_second: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket refilling at `per_second`, holding at most `burst`.
    pub fn new(per_second: f64, burst: u32) -> Self {
        Self {
            per_second,
            burst: f64::from(burst),
            tokens: f64::from(burst),
            last_refill: Instant::now(),
        }
    }

    /// Resolves when one token is available; never rejects.
    pub async fn acquire(&mut self) {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return;
        }

        let wait_ms = ((1.0 - self.tokens) / (self.per_second / 1000.0)).ceil() as u64;
        sleep(Duration::from_millis(wait_ms)).await;
        self.refill();
        self.tokens -= 1.0;
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.last_refill).as_millis() as f64;
        self.tokens = (self.tokens + elapsed_ms * self.per_second / 1000.0).min(self.burst);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let mut bucket = TokenBucket::new(2.0, 5);
        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixth_acquire_waits() {
        let mut bucket = TokenBucket::new(2.0, 5);
        for _ in 0..5 {
            bucket.acquire().await;
        }
        let start = Instant::now();
        bucket.acquire().await;
        // 1 token at 2/s is 500ms away
        assert_eq!(Instant::now().duration_since(start), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_burst() {
        let mut bucket = TokenBucket::new(10.0, 5);
        for _ in 0..5 {
            bucket.acquire().await;
        }

        // Far more than enough time to refill past the cap
        advance(Duration::from_secs(60)).await;

        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert_eq!(Instant::now(), start);

        // The cap held: the next acquire must wait
        let start = Instant::now();
        bucket.acquire().await;
        assert!(Instant::now() > start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_refill_carries_forward() {
        let mut bucket = TokenBucket::new(10.0, 5);
        for _ in 0..5 {
            bucket.acquire().await;
        }

        advance(Duration::from_millis(500)).await;

        // 500ms at 10/s refilled exactly 5 tokens
        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert_eq!(Instant::now(), start);

        let start = Instant::now();
        bucket.acquire().await;
        assert_eq!(Instant::now().duration_since(start), Duration::from_millis(100));
    }
}
