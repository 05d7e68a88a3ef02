// crates/labelcache/src/sink/mod.rs
// ============================================================================
// Module: Progress Sinks
// Description: Sink trait and reference implementations for refresh progress.
// Purpose: Deliver progress events to logs, callbacks, or nowhere.
// Dependencies: labelcache-core
// ============================================================================

//! ## Overview
//! A [`ProgressSink`] receives every [`RefreshEvent`] drained from a refresh
//! run. Events are routed to one of four severity levels by
//! [`ProgressSink::record`]:
//!
//! | Status       | Level     |
//! |--------------|-----------|
//! | `Updating`   | `info`    |
//! | `Successful` | `success` |
//! | `Warning`    | `warning` |
//! | `Failed`     | `error`   |
//!
//! Sinks are infallible from the caller's view; write failures are dropped so
//! a broken log never stalls a refresh.

// ============================================================================
// SECTION: Imports
// ============================================================================

use labelcache_core::RefreshEvent;
use labelcache_core::RefreshStatus;

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Four-level destination for refresh progress.
pub trait ProgressSink: Send + Sync {
    /// Work in progress.
    fn info(&self, event: &RefreshEvent);

    /// A chain completed.
    fn success(&self, event: &RefreshEvent);

    /// A tolerated problem.
    fn warning(&self, event: &RefreshEvent);

    /// The run aborted.
    fn error(&self, event: &RefreshEvent);

    /// Routes `event` to the level matching its status.
    fn record(&self, event: &RefreshEvent) {
        match event.status {
            RefreshStatus::Updating => self.info(event),
            RefreshStatus::Successful => self.success(event),
            RefreshStatus::Warning => self.warning(event),
            RefreshStatus::Failed => self.error(event),
        }
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn info(&self, _event: &RefreshEvent) {}

    fn success(&self, _event: &RefreshEvent) {}

    fn warning(&self, _event: &RefreshEvent) {}

    fn error(&self, _event: &RefreshEvent) {}
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod callback;
pub mod log;
pub mod stderr;

pub use callback::CallbackSink;
pub use log::LogSink;
pub use stderr::StderrSink;
