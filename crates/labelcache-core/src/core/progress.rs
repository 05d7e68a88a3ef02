// crates/labelcache-core/src/core/progress.rs
// ============================================================================
// Module: Label Cache Progress Events
// Description: Severity-tagged refresh progress events.
// Purpose: Describe what a refresh run is doing without binding to a sink.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A refresh run emits an ordered sequence of [`RefreshEvent`] values.
//! Consumers must not assume any fixed number of events per chain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ChainId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Severity of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    /// Work is in progress.
    Updating,
    /// A chain finished successfully.
    Successful,
    /// Something was tolerated but deserves attention.
    Warning,
    /// The run aborted.
    Failed,
}

impl RefreshStatus {
    /// Returns the stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Updating => "updating",
            Self::Successful => "successful",
            Self::Warning => "warning",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshEvent {
    /// Event severity.
    pub status: RefreshStatus,
    /// Chain the event concerns, if any.
    pub chain: Option<ChainId>,
    /// Free-text message.
    pub message: String,
}

impl RefreshEvent {
    /// Creates an event with an explicit status.
    #[must_use]
    pub fn new(status: RefreshStatus, chain: Option<ChainId>, message: impl Into<String>) -> Self {
        Self {
            status,
            chain,
            message: message.into(),
        }
    }

    /// In-progress event for `chain`.
    #[must_use]
    pub fn updating(chain: ChainId, message: impl Into<String>) -> Self {
        Self::new(RefreshStatus::Updating, Some(chain), message)
    }

    /// Success event for `chain`.
    #[must_use]
    pub fn successful(chain: ChainId, message: impl Into<String>) -> Self {
        Self::new(RefreshStatus::Successful, Some(chain), message)
    }

    /// Warning event for `chain`.
    #[must_use]
    pub fn warning(chain: ChainId, message: impl Into<String>) -> Self {
        Self::new(RefreshStatus::Warning, Some(chain), message)
    }

    /// Failure event, optionally tied to a chain.
    #[must_use]
    pub fn failed(chain: Option<ChainId>, message: impl Into<String>) -> Self {
        Self::new(RefreshStatus::Failed, chain, message)
    }
}
