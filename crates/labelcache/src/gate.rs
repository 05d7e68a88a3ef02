// crates/labelcache/src/gate.rs
// ============================================================================
// Module: Refresh Gate
// Description: Process-wide single-flight guard for refresh runs.
// Purpose: Serialize refresh runs so at most one touches the store at a time.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`RefreshGate`] hands out at most one [`RefreshPermit`] at a time. A second
//! caller blocks in [`RefreshGate::acquire`] until the outstanding permit is
//! dropped. The permit is moved into the refresh worker thread and dropped as
//! its last action, so the gate opens only after the worker has finished.
//!
//! A poisoned lock is recovered rather than propagated: the guarded state is a
//! single flag that is always consistent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::PoisonError;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Single-flight refresh guard.
///
/// # Invariants
/// - At most one [`RefreshPermit`] exists per gate at any time.
#[derive(Debug, Default)]
pub struct RefreshGate {
    /// True while a permit is outstanding.
    busy: Mutex<bool>,
    /// Signalled when a permit is released.
    released: Condvar,
}

impl RefreshGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the gate is free, then returns the permit.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> RefreshPermit {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        while *busy {
            busy = self.released.wait(busy).unwrap_or_else(PoisonError::into_inner);
        }
        *busy = true;
        drop(busy);
        RefreshPermit {
            gate: Arc::clone(self),
        }
    }

    /// Returns the permit when the gate is free, without blocking.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<RefreshPermit> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if *busy {
            return None;
        }
        *busy = true;
        drop(busy);
        Some(RefreshPermit {
            gate: Arc::clone(self),
        })
    }

    /// Returns true while a run holds the permit.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the busy flag and wakes one waiter.
    fn release(&self) {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        *busy = false;
        drop(busy);
        self.released.notify_one();
    }
}

// ============================================================================
// SECTION: Permit
// ============================================================================

/// Proof of exclusive refresh access; releases the gate on drop.
#[derive(Debug)]
pub struct RefreshPermit {
    /// Gate this permit was issued by.
    gate: Arc<RefreshGate>,
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
