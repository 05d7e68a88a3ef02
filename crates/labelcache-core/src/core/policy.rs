// crates/labelcache-core/src/core/policy.rs
// ============================================================================
// Module: Label Cache Refresh Policy
// Description: Timing and paging limits applied by the refresh orchestrator.
// Purpose: Keep orchestrator tunables in one explicit value.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`RefreshPolicy`] holds the per-chain polling bound, the optional pause
//! between poll iterations, and the result page size.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default wall-clock bound on polling a single job.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default number of rows requested per result page.
pub const DEFAULT_PAGE_SIZE: u32 = 100_000;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Orchestrator timing and paging limits.
///
/// # Invariants
/// - `poll_timeout` is measured from entry into the polling state.
/// - `poll_interval` of zero means back-to-back polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Maximum time spent polling one job.
    pub poll_timeout: Duration,
    /// Pause between poll iterations.
    pub poll_interval: Duration,
    /// Rows requested per page.
    pub page_size: u32,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            poll_interval: Duration::ZERO,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
