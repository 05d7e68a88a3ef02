// crates/labelcache-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Durable RecordStore backend using SQLite.
// Purpose: Persist address labels and maintenance markers in a local file.
// Dependencies: labelcache-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`RecordStore`] implementation with
//! two tables: `maintenance` keyed by chain and `info` keyed by
//! `(chain, address)`. Batch upserts run in a single transaction.
//!
//! [`RecordStore`]: labelcache_core::RecordStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteRecordStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
