// crates/labelcache-core/src/runtime/store.rs
// ============================================================================
// Module: Label Cache In-Memory Store
// Description: Simple in-memory record store for tests and demos.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`RecordStore`] for
//! tests and local demos. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::Address;
use crate::core::AddressRecord;
use crate::core::ChainId;
use crate::core::Timestamp;
use crate::interfaces::RecordStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable state behind the store mutex.
#[derive(Debug, Default)]
struct StoreState {
    /// Maintenance markers keyed by chain.
    maintenance: BTreeMap<ChainId, Timestamp>,
    /// Records keyed by chain then address.
    records: BTreeMap<(ChainId, Address), AddressRecord>,
}

/// In-memory record store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRecordStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns chains with a maintenance marker, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn chains(&self) -> Result<Vec<ChainId>, StoreError> {
        Ok(self.lock()?.maintenance.keys().copied().collect())
    }

    /// Acquires the state lock.
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Io("record store mutex poisoned".to_string()))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get_maintenance_time(&self, chain: ChainId) -> Result<Option<Timestamp>, StoreError> {
        Ok(self.lock()?.maintenance.get(&chain).copied())
    }

    fn set_maintenance_time(&self, chain: ChainId, at: Timestamp) -> Result<(), StoreError> {
        self.lock()?.maintenance.insert(chain, at);
        Ok(())
    }

    fn count_records(&self, chain: ChainId) -> Result<u64, StoreError> {
        let guard = self.lock()?;
        let count = guard.records.keys().filter(|(record_chain, _)| *record_chain == chain).count();
        u64::try_from(count).map_err(|err| StoreError::Invalid(err.to_string()))
    }

    fn get_record(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<AddressRecord>, StoreError> {
        Ok(self.lock()?.records.get(&(chain, *address)).cloned())
    }

    fn upsert_records(&self, records: &[AddressRecord]) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        for record in records {
            guard.records.insert((record.chain, record.address), record.clone());
        }
        Ok(())
    }
}
