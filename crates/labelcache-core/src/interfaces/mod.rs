// crates/labelcache-core/src/interfaces/mod.rs
// ============================================================================
// Module: Label Cache Interfaces
// Description: Collaborator traits for the record store and query-job client.
// Purpose: Let the refresh orchestrator run against any backend or stub.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The refresh orchestrator depends on two collaborators only: a
//! [`RecordStore`] for persistence and a [`QueryJobClient`] for remote query
//! execution. Both are `Send + Sync` so a run can move them onto its worker
//! thread behind an `Arc`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use thiserror::Error;

use crate::core::Address;
use crate::core::AddressRecord;
use crate::core::ChainId;
use crate::core::JobHandle;
use crate::core::LabelRow;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Record Store
// ============================================================================

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("record store io error: {0}")]
    Io(String),
    /// Backend query or transaction failure.
    #[error("record store database error: {0}")]
    Db(String),
    /// Stored data or inputs are invalid.
    #[error("record store invalid data: {0}")]
    Invalid(String),
}

/// Persistent mapping of (chain, address) to label metadata plus per-chain
/// maintenance markers.
pub trait RecordStore: Send + Sync {
    /// Returns the last successful refresh time for `chain`.
    ///
    /// Returns `Ok(None)` when the chain has never been refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_maintenance_time(&self, chain: ChainId) -> Result<Option<Timestamp>, StoreError>;

    /// Sets the maintenance marker for `chain`, replacing any prior value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn set_maintenance_time(&self, chain: ChainId, at: Timestamp) -> Result<(), StoreError>;

    /// Counts cached records for `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn count_records(&self, chain: ChainId) -> Result<u64, StoreError>;

    /// Looks up a single record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_record(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<AddressRecord>, StoreError>;

    /// Inserts or overwrites every record in `records` as one transaction.
    ///
    /// # Invariants
    /// - Either all records are written or none are.
    /// - Records absent from the batch are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transaction fails; prior state is kept.
    fn upsert_records(&self, records: &[AddressRecord]) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Query-Job Client
// ============================================================================

/// Query-job client errors.
#[derive(Debug, Error)]
pub enum JobClientError {
    /// Client configuration is unusable.
    #[error("query client config error: {0}")]
    Config(String),
    /// Transport failure (connect, timeout, HTTP status).
    #[error("query client transport error: {0}")]
    Transport(String),
    /// Remote returned a malformed or error response.
    #[error("query client protocol error: {0}")]
    Protocol(String),
    /// Remote accepted the submission but returned no run identifier.
    #[error("query run handle is empty")]
    EmptyHandle,
    /// Remote reported the run as failed or canceled.
    #[error("query run {state}: {message}")]
    QueryFailed {
        /// Remote run state.
        state: String,
        /// Remote error text, if any.
        message: String,
    },
    /// Retry budget was spent without a successful call.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Remote operation name.
        operation: String,
        /// Attempts made.
        attempts: u32,
        /// Text of the final error.
        last_error: String,
    },
    /// The caller's deadline passed before the call could succeed.
    #[error("{operation} reached its deadline after {attempts} attempts")]
    DeadlineExceeded {
        /// Remote operation name.
        operation: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl JobClientError {
    /// Returns true for errors worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }

    /// Returns true for semantic failures that must abort polling.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::EmptyHandle | Self::QueryFailed { .. })
    }
}

/// Result of a single status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Results are available.
    Ready,
    /// The run is still queued or executing.
    NotReady,
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    /// Rows on this page.
    pub rows: Vec<LabelRow>,
    /// One-indexed page number.
    pub page_number: u32,
    /// Total pages reported by the remote service.
    pub total_pages: u32,
}

/// Remote query engine with submit, poll, and paginated fetch.
///
/// Implementations own their retry policy; callers see only the final result.
pub trait QueryJobClient: Send + Sync {
    /// Submits `sql` and returns the run handle.
    ///
    /// # Errors
    ///
    /// Returns [`JobClientError::EmptyHandle`] when the remote returns no
    /// identifier, or another [`JobClientError`] when the call fails.
    fn submit(&self, sql: &str) -> Result<JobHandle, JobClientError>;

    /// Checks run status once without waiting.
    ///
    /// The call, including any internal retries, must return by `deadline`;
    /// an unanswered check past the deadline is reported as an error.
    ///
    /// # Errors
    ///
    /// Returns [`JobClientError::QueryFailed`] for a failed remote state, or
    /// another [`JobClientError`] when the call fails.
    fn poll(&self, handle: &JobHandle, deadline: Instant) -> Result<PollStatus, JobClientError>;

    /// Fetches one page of results for a completed run.
    ///
    /// `page_number` is one-indexed.
    ///
    /// # Errors
    ///
    /// Returns [`JobClientError`] when the call fails.
    fn fetch_page(
        &self,
        handle: &JobHandle,
        page_number: u32,
        page_size: u32,
    ) -> Result<ResultPage, JobClientError>;
}
