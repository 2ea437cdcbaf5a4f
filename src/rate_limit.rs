//! Token-bucket rate limiting for generation API calls.
//!
//! Each generation stage owns one bucket, shared by every row that is
//! concurrently in flight through that stage. `acquire` only ever delays
//! the caller; it never fails.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with continuous refill.
///
/// The bucket starts full. On each acquire the balance is topped up in
/// proportion to the wall-clock time elapsed since the last refill, capped
/// at capacity.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    capacity: f64,
    interval: Duration,
}

impl RateLimiter {
    /// Creates a bucket that admits `max_calls` calls per `interval_secs`
    /// seconds. A zero `max_calls` is treated as one.
    pub fn new(max_calls: u32, interval_secs: u64) -> Self {
        let capacity = max_calls.max(1) as f64;
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Takes one token, sleeping until the bucket can supply it.
    ///
    /// When the bucket is empty the caller sleeps for the minimal refill
    /// time with the lock released, then debits without re-checking the
    /// balance. Under heavy contention this can over-admit slightly; the
    /// bucket balance goes negative and later callers wait longer.
    pub async fn acquire(&self) {
        let wait = {
            let mut bucket = self.bucket.lock().await;
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            let refill = elapsed * self.capacity / self.interval.as_secs_f64();
            bucket.tokens = (bucket.tokens + refill).min(self.capacity);
            bucket.last_refill = now;

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return;
            }
            Duration::from_secs_f64(
                (1.0 - bucket.tokens) * self.interval.as_secs_f64() / self.capacity,
            )
        };

        tokio::time::sleep(wait).await;

        let mut bucket = self.bucket.lock().await;
        bucket.tokens -= 1.0;
    }

    /// Current token balance, for diagnostics.
    pub async fn available(&self) -> f64 {
        self.bucket.lock().await.tokens
    }
}
