// crates/labelcache/src/sink/stderr.rs
// ============================================================================
// Module: Stderr Progress Sink
// Description: Human-readable progress lines on stderr.
// Purpose: Default console output for synchronous refreshes.
// Dependencies: labelcache-core, std
// ============================================================================

//! ## Overview
//! [`StderrSink`] prints `[level] message` per event.

use std::io::Write;

use labelcache_core::RefreshEvent;

use crate::sink::ProgressSink;

/// Plain-text progress sink writing to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl StderrSink {
    /// Writes one line at `level`.
    fn write(level: &str, event: &RefreshEvent) {
        let _ = writeln!(std::io::stderr(), "[{level}] {}", event.message);
    }
}

impl ProgressSink for StderrSink {
    fn info(&self, event: &RefreshEvent) {
        Self::write("info", event);
    }

    fn success(&self, event: &RefreshEvent) {
        Self::write("success", event);
    }

    fn warning(&self, event: &RefreshEvent) {
        Self::write("warning", event);
    }

    fn error(&self, event: &RefreshEvent) {
        Self::write("error", event);
    }
}
