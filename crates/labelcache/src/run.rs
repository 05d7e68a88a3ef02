// crates/labelcache/src/run.rs
// ============================================================================
// Module: Refresh Run Handle
// Description: Consumer side of an in-flight refresh.
// Purpose: Own the progress stream and the worker so completion is explicit.
// Dependencies: labelcache-core, tokio
// ============================================================================

//! ## Overview
//! A [`RefreshRun`] owns both halves of completion: the progress receiver and
//! the worker thread handle. Events arrive in production order and the stream
//! ends exactly once, when the worker drops its sender. [`RefreshRun::finish`]
//! then joins the worker, so a caller holding the run observes full
//! termination, not just a closed channel.
//!
//! Events may be consumed asynchronously with [`RefreshRun::recv`] or from a
//! plain thread with [`RefreshRun::blocking_recv`]. The blocking methods must
//! not be called from inside an async runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread::JoinHandle;

use labelcache_core::RefreshEvent;
use tokio::sync::mpsc;

use crate::engine::RefreshError;
use crate::engine::RefreshReport;
use crate::sink::ProgressSink;

// ============================================================================
// SECTION: Run Handle
// ============================================================================

/// In-flight refresh run.
#[derive(Debug)]
pub struct RefreshRun {
    /// Progress stream; closed when the worker finishes.
    events: mpsc::Receiver<RefreshEvent>,
    /// Worker thread producing the events.
    worker: JoinHandle<Result<RefreshReport, RefreshError>>,
}

impl RefreshRun {
    /// Wraps a receiver and its producing worker.
    pub(crate) const fn new(
        events: mpsc::Receiver<RefreshEvent>,
        worker: JoinHandle<Result<RefreshReport, RefreshError>>,
    ) -> Self {
        Self {
            events,
            worker,
        }
    }

    /// Receives the next event; `None` once the run has ended.
    pub async fn recv(&mut self) -> Option<RefreshEvent> {
        self.events.recv().await
    }

    /// Blocking variant of [`RefreshRun::recv`].
    pub fn blocking_recv(&mut self) -> Option<RefreshEvent> {
        self.events.blocking_recv()
    }

    /// Dispatches every remaining event to `sink` until the stream closes.
    pub fn drain_to(&mut self, sink: &dyn ProgressSink) {
        while let Some(event) = self.events.blocking_recv() {
            sink.record(&event);
        }
    }

    /// Returns true once the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Drains to `sink`, then waits for the worker to terminate.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshError`] that aborted the run.
    pub fn wait(mut self, sink: &dyn ProgressSink) -> Result<RefreshReport, RefreshError> {
        self.drain_to(sink);
        self.finish()
    }

    /// Discards undelivered events and waits for the worker to terminate.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshError`] that aborted the run, or
    /// [`RefreshError::WorkerPanicked`].
    pub fn finish(self) -> Result<RefreshReport, RefreshError> {
        let Self {
            events,
            worker,
        } = self;
        drop(events);
        worker.join().map_err(|_| RefreshError::WorkerPanicked)?
    }
}
