//! # Fixed-interval retry policy for bounded waits.
//!
//! [`RetryPolicy`] controls how a bounded wait re-checks the page:
//! - [`RetryPolicy::interval`] the fixed delay between two attempts;
//! - [`RetryPolicy::max_retries`] how many re-checks follow the first one.
//!
//! A wait therefore evaluates its predicate at most `max_retries + 1` times.
//! The delay never grows: the thing being waited for is DOM readiness, not a
//! congested server.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use pagevisor::RetryPolicy;
//!
//! let policy = RetryPolicy::new(Duration::from_millis(200), 20);
//!
//! assert_eq!(policy.max_attempts(), 21);
//! assert_eq!(policy.delay(0), Duration::from_millis(200));
//! assert_eq!(policy.delay(19), Duration::from_millis(200));
//! assert!(policy.total_wait() == Duration::from_secs(4));
//! ```

use std::time::Duration;

/// Bounded, fixed-interval retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between two consecutive attempts.
    pub interval: Duration,
    /// Number of retries after the initial attempt (`0` = check once).
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    /// Returns the library-wide defaults:
    /// - `interval = 250ms`;
    /// - `max_retries = 10`.
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_retries: 10,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with an explicit interval and retry budget.
    pub const fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
        }
    }

    /// Same interval, different retry budget.
    pub const fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            interval: self.interval,
            max_retries,
        }
    }

    /// Same retry budget, different interval.
    pub const fn with_interval(self, interval: Duration) -> Self {
        Self {
            interval,
            max_retries: self.max_retries,
        }
    }

    /// Delay before the retry following `attempt` (0-indexed).
    ///
    /// Constant by construction; the argument exists so call sites read like
    /// any other per-attempt schedule.
    #[inline]
    pub fn delay(&self, _attempt: u32) -> Duration {
        self.interval
    }

    /// Total number of predicate evaluations, initial check included.
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Longest time a wait can take before exhausting, ignoring search cost.
    pub fn total_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_retries)
    }
}
