// crates/labelcache-core/src/runtime/mod.rs
// ============================================================================
// Module: Label Cache Runtime Helpers
// Description: In-process implementations of the core interfaces.
// Purpose: Support tests and demos without a database file.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime helpers that implement core interfaces entirely in memory.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::InMemoryRecordStore;
