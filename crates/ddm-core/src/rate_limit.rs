//! Token-bucket rate limiting: a bytes/second ceiling with bounded burst.
//!
//! Used both as a per-download cap (one bucket per job) and as a single
//! process-wide `GlobalLimiter` shared across all running jobs. Waits happen
//! outside the bucket's mutex so refills from other threads are never blocked
//! behind a sleeping caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Cap on a single sleep step so a cancellation flag is re-checked promptly
/// even when the computed wait is long.
const MAX_SLEEP_STEP: Duration = Duration::from_millis(20);

/// Result of a `throttle` call: consumed the tokens, or gave up because `cancel`
/// was observed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleOutcome {
    Ok,
    Cancelled,
}

struct BucketState {
    rate: f64,
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        if self.rate > 0.0 {
            self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        }
    }
}

/// Rate limiter enforcing a bytes/second ceiling with bounded burst.
/// Capacity equals `2 * rate` (2 seconds of burst). Safe to share across threads.
pub struct TokenBucket {
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate_bytes_per_sec: u64) -> Self {
        let rate = rate_bytes_per_sec as f64;
        let capacity = rate * 2.0;
        Self {
            state: Mutex::new(BucketState {
                rate,
                tokens: capacity,
                capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Updates the rate. Current tokens are clamped to the new capacity; any
    /// caller already waiting simply re-evaluates on its next wake.
    pub fn set_rate(&self, rate_bytes_per_sec: u64) {
        let mut s = self.state.lock().unwrap();
        s.rate = rate_bytes_per_sec as f64;
        s.capacity = s.rate * 2.0;
        s.tokens = s.tokens.min(s.capacity);
    }

    /// Consumes `n` tokens, waiting if insufficient are available. Returns
    /// `Cancelled` as soon as `cancel` is observed set, without consuming tokens.
    pub fn throttle(&self, n: u64, cancel: Option<&AtomicBool>) -> ThrottleOutcome {
        let n = n as f64;
        loop {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return ThrottleOutcome::Cancelled;
            }
            let wait_secs = {
                let mut s = self.state.lock().unwrap();
                s.refill();
                if s.rate <= 0.0 || s.tokens >= n {
                    s.tokens -= n.min(s.tokens);
                    None
                } else {
                    Some((n - s.tokens) / s.rate)
                }
            };
            let Some(secs) = wait_secs else {
                return ThrottleOutcome::Ok;
            };
            let mut remaining = Duration::from_secs_f64(secs.max(0.0));
            while remaining > Duration::ZERO {
                if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                    return ThrottleOutcome::Cancelled;
                }
                let step = remaining.min(MAX_SLEEP_STEP);
                std::thread::sleep(step);
                remaining = remaining.saturating_sub(step);
            }
        }
    }
}

/// Wraps an optional, atomically-swappable `TokenBucket`. `None` means unlimited.
/// Owned by the engine and shared by reference across all segment fetchers.
#[derive(Default)]
pub struct GlobalLimiter {
    bucket: RwLock<Option<Arc<TokenBucket>>>,
}

impl GlobalLimiter {
    pub fn new(rate_bytes_per_sec: Option<u64>) -> Self {
        Self {
            bucket: RwLock::new(rate_bytes_per_sec.map(|r| Arc::new(TokenBucket::new(r)))),
        }
    }

    /// Replaces the active bucket, or clears it when `rate_bytes_per_sec` is `None`.
    pub fn set_rate(&self, rate_bytes_per_sec: Option<u64>) {
        let mut guard = self.bucket.write().unwrap();
        *guard = rate_bytes_per_sec.map(|r| Arc::new(TokenBucket::new(r)));
    }

    /// Throttles `n` bytes through the currently active bucket, or passes through
    /// immediately when unlimited.
    pub fn throttle(&self, n: u64, cancel: Option<&AtomicBool>) -> ThrottleOutcome {
        let bucket = self.bucket.read().unwrap().clone();
        match bucket {
            Some(b) => b.throttle(n, cancel),
            None => ThrottleOutcome::Ok,
        }
    }
}
