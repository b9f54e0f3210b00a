//! Millisecond clocks for RSPP.
//!
//! Comparison logic only ever sees recorded timestamps. Wall clock time is
//! read through [`Clock`] so callers can pin it in tests.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of Unix-epoch milliseconds
pub trait Clock: Send + Sync {
    /// Current time in Unix milliseconds
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock pinned to a settable instant
#[derive(Debug, Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    /// Create a clock frozen at `now_ms`
    #[must_use]
    pub const fn new(now_ms: i64) -> Self {
        Self(AtomicI64::new(now_ms))
    }

    /// Move the clock to `now_ms`
    pub fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }

    /// Advance by `delta_ms`
    pub fn advance(&self, delta_ms: i64) {
        self.0.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Milliseconds per hour
pub const HOUR_MS: i64 = 60 * 60 * 1_000;

/// Milliseconds per day
pub const DAY_MS: i64 = 24 * HOUR_MS;
