// crates/labelcache-flipside/src/retry.rs
// ============================================================================
// Module: Remote Call Retry Policy
// Description: Fixed-delay retry wrapper for remote calls.
// Purpose: Bound transient-failure retries for submit, poll, and fetch.
// Dependencies: labelcache-core
// ============================================================================

//! ## Overview
//! [`RetryPolicy`] re-runs a call while it fails with a retryable
//! [`JobClientError`], sleeping a fixed delay between attempts. There is no
//! backoff. Non-retryable errors return immediately. [`RetryPolicy::run_until`]
//! adds a wall-clock deadline that bounds the whole loop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;
use std::time::Instant;

use labelcache_core::JobClientError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default attempts per remote call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Fixed-delay retry policy.
///
/// # Invariants
/// - `max_attempts` of zero behaves as one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Sleep between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Runs `call` until it succeeds, fails permanently, or the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error unchanged, or
    /// [`JobClientError::RetriesExhausted`] carrying the last retryable error.
    pub fn run<T>(
        &self,
        operation: &str,
        mut call: impl FnMut() -> Result<T, JobClientError>,
    ) -> Result<T, JobClientError> {
        self.run_bounded(operation, None, |_| call())
    }

    /// Runs `call` like [`RetryPolicy::run`] but never past `deadline`.
    ///
    /// Each attempt receives the time left before the deadline. No attempt
    /// starts once the deadline has passed, and retry delays are clamped to
    /// the time left.
    ///
    /// # Errors
    ///
    /// Returns [`JobClientError::DeadlineExceeded`] when the deadline passes
    /// before a successful call, otherwise as [`RetryPolicy::run`].
    pub fn run_until<T>(
        &self,
        operation: &str,
        deadline: Instant,
        call: impl FnMut(Option<Duration>) -> Result<T, JobClientError>,
    ) -> Result<T, JobClientError> {
        self.run_bounded(operation, Some(deadline), call)
    }

    /// Shared attempt loop; `call` receives the remaining time when bounded.
    fn run_bounded<T>(
        &self,
        operation: &str,
        deadline: Option<Instant>,
        mut call: impl FnMut(Option<Duration>) -> Result<T, JobClientError>,
    ) -> Result<T, JobClientError> {
        let attempts = self.max_attempts.max(1);
        let mut made = 0;
        let mut last_error = String::new();
        while made < attempts {
            let remaining = deadline.map(|at| at.saturating_duration_since(Instant::now()));
            if remaining.is_some_and(|left| left.is_zero()) {
                return Err(JobClientError::DeadlineExceeded {
                    operation: operation.to_string(),
                    attempts: made,
                });
            }
            made += 1;
            match call(remaining) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => last_error = err.to_string(),
            }
            if made < attempts && !self.delay.is_zero() {
                let left = deadline.map_or(self.delay, |at| at.saturating_duration_since(Instant::now()));
                thread::sleep(self.delay.min(left));
            }
        }
        Err(JobClientError::RetriesExhausted {
            operation: operation.to_string(),
            attempts,
            last_error,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
