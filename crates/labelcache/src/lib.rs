// crates/labelcache/src/lib.rs
// ============================================================================
// Module: Label Cache Library
// Description: Refresh orchestration and the caller-facing label cache.
// Purpose: Keep a local address-label cache current from remote query jobs.
// Dependencies: labelcache-config, labelcache-core, labelcache-flipside,
//               labelcache-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! This crate wires the record store and the query-job client into a refresh
//! pipeline:
//! - [`RefreshEngine`] runs the per-chain submit, poll, fetch, reconcile, and
//!   stamp sequence on a worker thread.
//! - [`RefreshGate`] keeps runs single-flight.
//! - [`RefreshRun`] owns the progress stream and the worker.
//! - [`ProgressSink`] implementations render progress.
//! - [`LabelCache`] is the handle most callers need.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod engine;
pub mod gate;
pub mod run;
pub mod sink;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::LabelCache;
pub use cache::LabelCacheError;
pub use engine::ChainSummary;
pub use engine::PROGRESS_CHANNEL_CAPACITY;
pub use engine::PollOutcome;
pub use engine::RefreshContext;
pub use engine::RefreshEngine;
pub use engine::RefreshError;
pub use engine::RefreshReport;
pub use gate::RefreshGate;
pub use gate::RefreshPermit;
pub use run::RefreshRun;
pub use sink::CallbackSink;
pub use sink::LogSink;
pub use sink::NullSink;
pub use sink::ProgressSink;
pub use sink::StderrSink;
