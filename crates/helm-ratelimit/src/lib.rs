//! Token-bucket rate limiter: admission control on the effect boundary,
//! checked before any PDP call.
//!
//! Time is an explicit parameter rather than read from the wall clock
//! internally. The limiter itself has no hidden state beyond the bucket
//! map, so callers (tests, or the kernel's suspension-point clock) decide
//! what "now" means. Refill is atomic per-principal: each bucket lives
//! behind its own slice of a single coarse-grained map lock, held only
//! for the refill-and-decide step.

#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub rpm: u32,
    pub burst: u32,
}

impl RateLimitPolicy {
    pub fn refill_rate_per_s(&self) -> f64 {
        f64::from(self.rpm) / 60.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill_ms: u64,
}

/// Per-principal token-bucket admission gate.
///
/// Fail-closed: if the internal lock is poisoned (the in-memory
/// equivalent of "the store is unreachable"), `allow` denies rather than
/// panicking or silently admitting.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// `Allow(principal, policy, cost) -> bool`. `now_ms` is the caller's
    /// monotonic clock reading in milliseconds.
    pub fn allow(&self, principal: &str, policy: RateLimitPolicy, cost: f64, now_ms: u64) -> bool {
        let Ok(mut buckets) = self.buckets.lock() else {
            return false;
        };
        let capacity = f64::from(policy.burst);
        let bucket = buckets.entry(principal.to_string()).or_insert(Bucket {
            tokens: capacity,
            last_refill_ms: now_ms,
        });

        let elapsed_s = now_ms.saturating_sub(bucket.last_refill_ms) as f64 / 1000.0;
        let refilled = (bucket.tokens + elapsed_s * policy.refill_rate_per_s()).min(capacity);
        bucket.last_refill_ms = now_ms;

        if refilled >= cost {
            bucket.tokens = refilled - cost;
            true
        } else {
            bucket.tokens = refilled;
            false
        }
    }

    /// Drop a principal's bucket (e.g. TTL eviction of idle principals).
    pub fn evict(&self, principal: &str) {
        if let Ok(mut buckets) = self.buckets.lock() {
            buckets.remove(principal);
        }
    }
}
