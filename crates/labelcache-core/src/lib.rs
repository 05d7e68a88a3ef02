// crates/labelcache-core/src/lib.rs
// ============================================================================
// Module: Label Cache Core Library
// Description: Public API surface for the label cache core.
// Purpose: Expose domain types, collaborator interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Label cache core defines the address-label domain model shared by the
//! record store, the remote query-job client, and the refresh orchestrator.
//! It is backend-agnostic: persistence and remote execution integrate through
//! the [`RecordStore`] and [`QueryJobClient`] interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::JobClientError;
pub use interfaces::PollStatus;
pub use interfaces::QueryJobClient;
pub use interfaces::RecordStore;
pub use interfaces::ResultPage;
pub use interfaces::StoreError;
pub use runtime::InMemoryRecordStore;
