// crates/labelcache/src/sink/callback.rs
// ============================================================================
// Module: Callback Progress Sink
// Description: Closure-backed progress sink.
// Purpose: Let embedders route progress into their own logging.
// Dependencies: labelcache-core, std
// ============================================================================

//! ## Overview
//! [`CallbackSink`] invokes one handler per severity level. [`CallbackSink::new`]
//! installs a single handler for all four levels; [`CallbackSink::with_levels`]
//! takes one per level.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use labelcache_core::RefreshEvent;

use crate::sink::ProgressSink;

// ============================================================================
// SECTION: Callback Sink
// ============================================================================

/// Handler signature used by the sink.
type EventHandler = dyn Fn(&RefreshEvent) + Send + Sync;

/// Callback-based progress sink.
#[derive(Clone)]
pub struct CallbackSink {
    /// Handler for in-progress events.
    info: Arc<EventHandler>,
    /// Handler for success events.
    success: Arc<EventHandler>,
    /// Handler for warning events.
    warning: Arc<EventHandler>,
    /// Handler for failure events.
    error: Arc<EventHandler>,
}

impl CallbackSink {
    /// Creates a sink that sends every level to `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RefreshEvent) + Send + Sync + 'static,
    {
        let handler: Arc<EventHandler> = Arc::new(handler);
        Self {
            info: Arc::clone(&handler),
            success: Arc::clone(&handler),
            warning: Arc::clone(&handler),
            error: handler,
        }
    }

    /// Creates a sink with a dedicated handler per level.
    pub fn with_levels<I, S, W, E>(info: I, success: S, warning: W, error: E) -> Self
    where
        I: Fn(&RefreshEvent) + Send + Sync + 'static,
        S: Fn(&RefreshEvent) + Send + Sync + 'static,
        W: Fn(&RefreshEvent) + Send + Sync + 'static,
        E: Fn(&RefreshEvent) + Send + Sync + 'static,
    {
        Self {
            info: Arc::new(info),
            success: Arc::new(success),
            warning: Arc::new(warning),
            error: Arc::new(error),
        }
    }
}

impl ProgressSink for CallbackSink {
    fn info(&self, event: &RefreshEvent) {
        (self.info)(event);
    }

    fn success(&self, event: &RefreshEvent) {
        (self.success)(event);
    }

    fn warning(&self, event: &RefreshEvent) {
        (self.warning)(event);
    }

    fn error(&self, event: &RefreshEvent) {
        (self.error)(event);
    }
}
