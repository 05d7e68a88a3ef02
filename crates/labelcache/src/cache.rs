// crates/labelcache/src/cache.rs
// ============================================================================
// Module: Label Cache
// Description: Caller-facing cache handle over SQLite and the Flipside client.
// Purpose: Open the store, serve lookups, and trigger refreshes.
// Dependencies: labelcache-config, labelcache-core, labelcache-flipside,
//               labelcache-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! [`LabelCache`] bundles an opened [`SqliteRecordStore`] with a
//! [`RefreshEngine`]. Reads go straight to the store and are never retried;
//! refreshes go through the engine and its single-flight gate.
//!
//! Credentials are taken at construction and never echoed back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use labelcache_config::ConfigError;
use labelcache_config::LabelCacheConfig;
use labelcache_core::Address;
use labelcache_core::AddressError;
use labelcache_core::AddressRecord;
use labelcache_core::ChainId;
use labelcache_core::JobClientError;
use labelcache_core::QueryJobClient;
use labelcache_core::RecordStore;
use labelcache_core::StoreError;
use labelcache_core::Timestamp;
use labelcache_flipside::FlipsideClient;
use labelcache_store_sqlite::SqliteRecordStore;
use thiserror::Error;

use crate::engine::RefreshContext;
use crate::engine::RefreshEngine;
use crate::engine::RefreshError;
use crate::engine::RefreshReport;
use crate::run::RefreshRun;
use crate::sink::ProgressSink;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by the cache handle.
#[derive(Debug, Error)]
pub enum LabelCacheError {
    /// Store open or read failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Remote client construction failure.
    #[error(transparent)]
    Client(#[from] JobClientError),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Lookup address could not be parsed.
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
}

// ============================================================================
// SECTION: Cache Handle
// ============================================================================

/// Local address-label cache with on-demand refresh.
#[derive(Clone)]
pub struct LabelCache {
    /// Opened store.
    store: Arc<SqliteRecordStore>,
    /// Refresh orchestrator over the same store.
    engine: RefreshEngine,
}

impl LabelCache {
    /// Opens the cache at `path` using default settings and `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError`] when the store cannot be opened or the key
    /// is empty.
    pub fn open(path: impl AsRef<Path>, api_key: impl Into<String>) -> Result<Self, LabelCacheError> {
        let mut config = LabelCacheConfig::default();
        config.store.path = path.as_ref().to_path_buf();
        Self::from_config_with_key(&config, api_key.into())
    }

    /// Opens the cache from `config`, resolving the API key from it.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError`] when the key is missing or opening fails.
    pub fn from_config(config: &LabelCacheConfig) -> Result<Self, LabelCacheError> {
        let client = FlipsideClient::new(config.client_config()?)?;
        Self::from_parts(config, Arc::new(client))
    }

    /// Opens the cache from `config` with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError`] when opening fails.
    pub fn from_config_with_key(
        config: &LabelCacheConfig,
        api_key: String,
    ) -> Result<Self, LabelCacheError> {
        let client = FlipsideClient::new(config.client_config_for_key(api_key))?;
        Self::from_parts(config, Arc::new(client))
    }

    /// Opens the store from `config` and pairs it with any query client.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError::Store`] when the store cannot be opened.
    pub fn from_parts(
        config: &LabelCacheConfig,
        client: Arc<dyn QueryJobClient>,
    ) -> Result<Self, LabelCacheError> {
        let store =
            Arc::new(SqliteRecordStore::new(config.store_config()).map_err(StoreError::from)?);
        let engine = RefreshEngine::new(RefreshContext {
            store: Arc::clone(&store) as Arc<dyn RecordStore>,
            client,
            chains: config.chain_queries(),
            policy: config.refresh_policy(),
        });
        Ok(Self {
            store,
            engine,
        })
    }

    /// Returns the active `SQLite` journal mode.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError::Store`] when the pragma query fails.
    pub fn journal_mode(&self) -> Result<String, LabelCacheError> {
        Ok(self.store.journal_mode().map_err(StoreError::from)?)
    }

    /// Returns chains with a maintenance marker, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError::Store`] when the query fails.
    pub fn chains(&self) -> Result<Vec<ChainId>, LabelCacheError> {
        Ok(self.store.chains().map_err(StoreError::from)?)
    }

    /// Returns the chains refreshed by this cache, in refresh order.
    #[must_use]
    pub fn configured_chains(&self) -> Vec<ChainId> {
        self.engine.context().chains.iter().map(|query| query.chain).collect()
    }

    /// Returns the last successful refresh time for `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError::Store`] when the query fails.
    pub fn maintenance_time(&self, chain: ChainId) -> Result<Option<Timestamp>, LabelCacheError> {
        Ok(self.store.get_maintenance_time(chain)?)
    }

    /// Returns the number of cached records for `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError::Store`] when the query fails.
    pub fn record_count(&self, chain: ChainId) -> Result<u64, LabelCacheError> {
        Ok(self.store.count_records(chain)?)
    }

    /// Looks up one record.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError::Store`] when the query fails.
    pub fn get_record(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<AddressRecord>, LabelCacheError> {
        Ok(self.store.get_record(chain, address)?)
    }

    /// Parses `address` and looks up its record.
    ///
    /// # Errors
    ///
    /// Returns [`LabelCacheError::Address`] for malformed input, or
    /// [`LabelCacheError::Store`] when the query fails.
    pub fn lookup(
        &self,
        chain: ChainId,
        address: &str,
    ) -> Result<Option<AddressRecord>, LabelCacheError> {
        let address = Address::parse(address)?;
        self.get_record(chain, &address)
    }

    /// Starts a background refresh; see [`RefreshEngine::refresh_async`].
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Spawn`] when the worker cannot be started.
    pub fn refresh_async(&self) -> Result<RefreshRun, RefreshError> {
        self.engine.refresh_async()
    }

    /// Runs a refresh to completion; see [`RefreshEngine::refresh_sync`].
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshError`] that aborted the run.
    pub fn refresh_sync(&self, sink: &dyn ProgressSink) -> Result<RefreshReport, RefreshError> {
        self.engine.refresh_sync(sink)
    }

    /// Returns the refresh engine.
    #[must_use]
    pub const fn engine(&self) -> &RefreshEngine {
        &self.engine
    }
}
