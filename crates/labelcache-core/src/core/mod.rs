// crates/labelcache-core/src/core/mod.rs
// ============================================================================
// Module: Label Cache Domain Model
// Description: Identifiers, records, progress events, and chain catalog.
// Purpose: Group the pure data types used across the label cache.
// Dependencies: hex, serde, thiserror
// ============================================================================

//! ## Overview
//! Pure domain types with no I/O. Submodules are re-exported flat so callers
//! can import everything from the crate root.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod chains;
pub mod identifiers;
pub mod policy;
pub mod progress;
pub mod record;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use chains::*;
pub use identifiers::*;
pub use policy::*;
pub use progress::*;
pub use record::*;
pub use time::*;
