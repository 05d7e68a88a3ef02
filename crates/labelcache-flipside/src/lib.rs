// crates/labelcache-flipside/src/lib.rs
// ============================================================================
// Module: Flipside Query-Job Client
// Description: QueryJobClient backed by the Flipside JSON-RPC API.
// Purpose: Submit label queries, poll run state, and page through results.
// Dependencies: labelcache-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! This crate provides [`FlipsideClient`], a blocking [`QueryJobClient`] that
//! speaks JSON-RPC 2.0 over HTTPS. Every remote call is wrapped in a
//! [`RetryPolicy`] with a fixed delay between attempts.
//!
//! [`QueryJobClient`]: labelcache_core::QueryJobClient

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod retry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::DEFAULT_ENDPOINT;
pub use client::FlipsideClient;
pub use client::FlipsideClientConfig;
pub use retry::RetryPolicy;
