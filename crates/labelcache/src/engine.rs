// crates/labelcache/src/engine.rs
// ============================================================================
// Module: Refresh Engine
// Description: Per-chain submit, poll, paginate, reconcile, and stamp pipeline.
// Purpose: Rebuild cached address labels from remote query jobs.
// Dependencies: labelcache-core, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`RefreshEngine`] walks the configured chains in order and, for each one,
//! drives a query job through five phases:
//!
//! 1. submit the chain SQL and take the run handle
//! 2. poll until ready, bounded by [`RefreshPolicy::poll_timeout`]
//! 3. fetch pages `1..=total_pages` and accumulate rows
//! 4. reconcile rows into records and upsert them in one transaction
//! 5. stamp the chain maintenance time
//!
//! Any failure aborts the whole run; later chains are not attempted. Progress
//! is streamed over a bounded channel as [`RefreshEvent`] values and the run
//! ends with exactly one terminal event for a failure, or one success event per
//! chain.
//!
//! Invariants:
//! - At most one run is active per [`RefreshGate`].
//! - The maintenance marker is written only after the chain upsert committed.
//! - Transient poll failures are reported as warnings, never silently dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use labelcache_core::ChainId;
use labelcache_core::ChainQuery;
use labelcache_core::JobClientError;
use labelcache_core::JobHandle;
use labelcache_core::LabelRow;
use labelcache_core::PollStatus;
use labelcache_core::QueryJobClient;
use labelcache_core::RecordStore;
use labelcache_core::RefreshEvent;
use labelcache_core::RefreshPolicy;
use labelcache_core::StoreError;
use labelcache_core::Timestamp;
use labelcache_core::reconcile_rows;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::gate::RefreshGate;
use crate::run::RefreshRun;
use crate::sink::ProgressSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Buffered progress events before the worker blocks on a slow consumer.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Name given to the worker thread.
const WORKER_THREAD_NAME: &str = "labelcache-refresh";

/// Upper bound on the deadline handed to status checks.
const MAX_POLL_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Run-aborting refresh failures.
///
/// The `Display` text is the message of the terminal failure event.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Job submission failed or returned no handle.
    #[error("Failed to create query run: {source}, chain id: {chain}")]
    Submit {
        /// Chain being refreshed.
        chain: ChainId,
        /// Client failure.
        source: JobClientError,
    },
    /// The job never became ready within the poll timeout.
    #[error("Query run time out: {handle} chain id: {chain}")]
    PollTimeout {
        /// Chain being refreshed.
        chain: ChainId,
        /// Run handle.
        handle: JobHandle,
        /// Time spent polling.
        elapsed: Duration,
    },
    /// The remote reported the job as failed.
    #[error("Query run failed: {source}, query run id: {handle}, chain id: {chain}")]
    QueryFailed {
        /// Chain being refreshed.
        chain: ChainId,
        /// Run handle.
        handle: JobHandle,
        /// Client failure.
        source: JobClientError,
    },
    /// A result page could not be fetched.
    #[error(
        "Failed to get query run result: {source}, page: {page}, query run id: {handle}, chain id: {chain}"
    )]
    Fetch {
        /// Chain being refreshed.
        chain: ChainId,
        /// Run handle.
        handle: JobHandle,
        /// One-indexed page that failed.
        page: u32,
        /// Client failure.
        source: JobClientError,
    },
    /// The record batch was not committed.
    #[error("Failed to upsert address records: {source}, chain id: {chain}")]
    Upsert {
        /// Chain being refreshed.
        chain: ChainId,
        /// Store failure.
        source: StoreError,
    },
    /// The maintenance marker was not written.
    #[error("Failed to update maintenance: {source}, chain id: {chain}")]
    Stamp {
        /// Chain being refreshed.
        chain: ChainId,
        /// Store failure.
        source: StoreError,
    },
    /// The worker thread could not be started.
    #[error("Failed to start refresh worker: {0}")]
    Spawn(String),
    /// The worker thread panicked.
    #[error("Refresh worker panicked")]
    WorkerPanicked,
}

impl RefreshError {
    /// Returns the chain the failure concerns, if any.
    #[must_use]
    pub const fn chain(&self) -> Option<ChainId> {
        match self {
            Self::Submit {
                chain, ..
            }
            | Self::PollTimeout {
                chain, ..
            }
            | Self::QueryFailed {
                chain, ..
            }
            | Self::Fetch {
                chain, ..
            }
            | Self::Upsert {
                chain, ..
            }
            | Self::Stamp {
                chain, ..
            } => Some(*chain),
            Self::Spawn(_) | Self::WorkerPanicked => None,
        }
    }
}

// ============================================================================
// SECTION: Poll Outcome
// ============================================================================

/// Classified result of one status check.
#[derive(Debug)]
pub enum PollOutcome {
    /// Results are available.
    Ready,
    /// Keep polling.
    NotReady,
    /// The check failed but polling may continue.
    TransientError(JobClientError),
    /// The job can never succeed.
    FatalError(JobClientError),
}

impl From<Result<PollStatus, JobClientError>> for PollOutcome {
    fn from(result: Result<PollStatus, JobClientError>) -> Self {
        match result {
            Ok(PollStatus::Ready) => Self::Ready,
            Ok(PollStatus::NotReady) => Self::NotReady,
            Err(err) if err.is_fatal() => Self::FatalError(err),
            Err(err) => Self::TransientError(err),
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Outcome of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    /// Chain refreshed.
    pub chain: ChainId,
    /// Run handle used.
    pub handle: JobHandle,
    /// Rows received across all pages.
    pub rows_fetched: usize,
    /// Records written in the batch.
    pub records_written: usize,
    /// Rows dropped for invalid addresses.
    pub rows_skipped: usize,
    /// Records cached for the chain after the upsert, when countable.
    pub total_records: Option<u64>,
    /// Records added by this run, when both counts were available.
    pub new_records: Option<u64>,
    /// Maintenance time written.
    pub maintained_at: Timestamp,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Per-chain summaries in refresh order.
    pub chains: Vec<ChainSummary>,
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Collaborators and limits for refresh runs.
#[derive(Clone)]
pub struct RefreshContext {
    /// Destination store.
    pub store: Arc<dyn RecordStore>,
    /// Remote query client.
    pub client: Arc<dyn QueryJobClient>,
    /// Chains refreshed in order.
    pub chains: Vec<ChainQuery>,
    /// Timing and paging limits.
    pub policy: RefreshPolicy,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Single-flight refresh orchestrator.
#[derive(Clone)]
pub struct RefreshEngine {
    /// Shared collaborators.
    context: Arc<RefreshContext>,
    /// Single-flight guard.
    gate: Arc<RefreshGate>,
}

impl RefreshEngine {
    /// Creates an engine with its own gate.
    #[must_use]
    pub fn new(context: RefreshContext) -> Self {
        Self::with_gate(context, Arc::new(RefreshGate::new()))
    }

    /// Creates an engine that shares `gate` with other engines.
    #[must_use]
    pub fn with_gate(context: RefreshContext, gate: Arc<RefreshGate>) -> Self {
        Self {
            context: Arc::new(context),
            gate,
        }
    }

    /// Returns the engine context.
    #[must_use]
    pub fn context(&self) -> &RefreshContext {
        &self.context
    }

    /// Returns the single-flight gate.
    #[must_use]
    pub const fn gate(&self) -> &Arc<RefreshGate> {
        &self.gate
    }

    /// Starts a refresh on a worker thread and returns its run handle.
    ///
    /// Blocks until any active run on the same gate has finished.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Spawn`] when the worker cannot be started.
    pub fn refresh_async(&self) -> Result<RefreshRun, RefreshError> {
        let permit = self.gate.acquire();
        let (sender, receiver) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let context = Arc::clone(&self.context);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _permit = permit;
                let events = EventEmitter {
                    sender,
                };
                run_chains(&context, &events)
            })
            .map_err(|err| RefreshError::Spawn(err.to_string()))?;
        Ok(RefreshRun::new(receiver, worker))
    }

    /// Runs a refresh to completion, dispatching every event to `sink`.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshError`] that aborted the run.
    pub fn refresh_sync(&self, sink: &dyn ProgressSink) -> Result<RefreshReport, RefreshError> {
        self.refresh_async()?.wait(sink)
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Producer side of the progress channel.
struct EventEmitter {
    /// Channel sender; closed when the emitter drops.
    sender: mpsc::Sender<RefreshEvent>,
}

impl EventEmitter {
    /// Sends `event`, ignoring a consumer that has gone away.
    fn emit(&self, event: RefreshEvent) {
        let _ = self.sender.blocking_send(event);
    }
}

/// Refreshes every configured chain, stopping at the first failure.
fn run_chains(
    context: &RefreshContext,
    events: &EventEmitter,
) -> Result<RefreshReport, RefreshError> {
    let mut report = RefreshReport::default();
    for query in &context.chains {
        match refresh_chain(context, query, events) {
            Ok(summary) => report.chains.push(summary),
            Err(err) => {
                events.emit(RefreshEvent::failed(err.chain(), err.to_string()));
                return Err(err);
            }
        }
    }
    Ok(report)
}

/// Runs the full pipeline for one chain.
fn refresh_chain(
    context: &RefreshContext,
    query: &ChainQuery,
    events: &EventEmitter,
) -> Result<ChainSummary, RefreshError> {
    let chain = query.chain;
    events.emit(RefreshEvent::updating(chain, format!("Updating chain id: {chain}")));

    let handle = submit(context, query)?;
    events.emit(RefreshEvent::updating(
        chain,
        format!("Query run id got: {handle}, chain id: {chain}"),
    ));

    wait_until_ready(context, chain, &handle, events)?;
    events.emit(RefreshEvent::updating(chain, format!("Query run done: {handle}, chain id: {chain}")));

    let rows = fetch_all_pages(context, chain, &handle)?;
    let rows_fetched = rows.len();
    events.emit(RefreshEvent::updating(
        chain,
        format!("Query run results got: {rows_fetched}, query run id: {handle}, chain id: {chain}"),
    ));

    let count_before = count_records(context, chain, events);
    let reconciliation = reconcile_rows(chain, rows);
    for skipped in &reconciliation.skipped {
        events.emit(RefreshEvent::warning(
            chain,
            format!(
                "Skipped row with invalid address {:?}: {}, chain id: {chain}",
                skipped.address, skipped.reason
            ),
        ));
    }

    context.store.upsert_records(&reconciliation.records).map_err(|source| {
        RefreshError::Upsert {
            chain,
            source,
        }
    })?;

    let maintained_at = Timestamp::now();
    context.store.set_maintenance_time(chain, maintained_at).map_err(|source| {
        RefreshError::Stamp {
            chain,
            source,
        }
    })?;

    let count_after = count_records(context, chain, events);
    let new_records = count_before.zip(count_after).map(|(before, after)| after.saturating_sub(before));
    let records_written = reconciliation.records.len();
    let message = match (count_after, new_records) {
        (Some(total), Some(delta)) => format!(
            "Address records are up to date, chain id: {chain}, records: {total}, updates: {delta}"
        ),
        _ => format!(
            "Address records are up to date, chain id: {chain}, records written: {records_written}"
        ),
    };
    events.emit(RefreshEvent::successful(chain, message));

    Ok(ChainSummary {
        chain,
        handle,
        rows_fetched,
        records_written,
        rows_skipped: reconciliation.skipped.len(),
        total_records: count_after,
        new_records,
        maintained_at,
    })
}

/// Submits the chain query; an empty handle counts as a failed submission.
fn submit(context: &RefreshContext, query: &ChainQuery) -> Result<JobHandle, RefreshError> {
    let chain = query.chain;
    let handle = context.client.submit(&query.sql).map_err(|source| RefreshError::Submit {
        chain,
        source,
    })?;
    if handle.is_empty() {
        return Err(RefreshError::Submit {
            chain,
            source: JobClientError::EmptyHandle,
        });
    }
    Ok(handle)
}

/// Polls until the job is ready, failed, or the timeout elapses.
///
/// Every status check is bounded by the same deadline, so a stalled check
/// cannot hold the run past the timeout.
fn wait_until_ready(
    context: &RefreshContext,
    chain: ChainId,
    handle: &JobHandle,
    events: &EventEmitter,
) -> Result<(), RefreshError> {
    let policy = context.policy;
    let started = Instant::now();
    let deadline = started + policy.poll_timeout.min(MAX_POLL_WINDOW);
    loop {
        let elapsed = started.elapsed();
        if elapsed >= policy.poll_timeout {
            return Err(RefreshError::PollTimeout {
                chain,
                handle: handle.clone(),
                elapsed,
            });
        }
        match PollOutcome::from(context.client.poll(handle, deadline)) {
            PollOutcome::Ready => return Ok(()),
            PollOutcome::NotReady => {}
            PollOutcome::TransientError(err) => events.emit(RefreshEvent::warning(
                chain,
                format!("Query run status check failed: {err}, query run id: {handle}, chain id: {chain}"),
            )),
            PollOutcome::FatalError(source) => {
                return Err(RefreshError::QueryFailed {
                    chain,
                    handle: handle.clone(),
                    source,
                });
            }
        }
        if !policy.poll_interval.is_zero() {
            let remaining = policy.poll_timeout.saturating_sub(started.elapsed());
            thread::sleep(policy.poll_interval.min(remaining));
        }
    }
}

/// Fetches one-indexed pages until the reported total is reached.
fn fetch_all_pages(
    context: &RefreshContext,
    chain: ChainId,
    handle: &JobHandle,
) -> Result<Vec<LabelRow>, RefreshError> {
    let mut rows = Vec::new();
    let mut page_number: u32 = 1;
    loop {
        let page = context
            .client
            .fetch_page(handle, page_number, context.policy.page_size)
            .map_err(|source| RefreshError::Fetch {
                chain,
                handle: handle.clone(),
                page: page_number,
                source,
            })?;
        rows.extend(page.rows);
        if page_number >= page.total_pages {
            return Ok(rows);
        }
        page_number += 1;
    }
}

/// Counts chain records for telemetry; a failure becomes a warning.
fn count_records(context: &RefreshContext, chain: ChainId, events: &EventEmitter) -> Option<u64> {
    match context.store.count_records(chain) {
        Ok(count) => Some(count),
        Err(err) => {
            events.emit(RefreshEvent::warning(
                chain,
                format!("Failed to count address records: {err}, chain id: {chain}"),
            ));
            None
        }
    }
}
