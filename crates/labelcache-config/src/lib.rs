// crates/labelcache-config/src/lib.rs
// ============================================================================
// Module: Label Cache Config Library
// Description: Canonical config model and validation for labelcache.toml.
// Purpose: Single source of truth for store, remote, refresh, and chain settings.
// Dependencies: labelcache-core, labelcache-flipside, labelcache-store-sqlite, toml
// ============================================================================

//! ## Overview
//! `labelcache-config` loads `labelcache.toml`, applies defaults for every
//! omitted section, and validates the result before any store or client is
//! built from it. Credentials are resolved on demand and never rendered by
//! `Debug`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
