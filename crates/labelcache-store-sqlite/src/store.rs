// crates/labelcache-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Durable RecordStore backed by SQLite.
// Purpose: Persist address records and per-chain maintenance markers.
// Dependencies: labelcache-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`RecordStore`] using `SQLite`. The schema
//! has no surrogate keys: `maintenance` is keyed by `chain_id` and `info` by
//! `(chain_id, address)`, both `WITHOUT ROWID`. Addresses are stored in their
//! canonical lowercase `0x` form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use labelcache_core::Address;
use labelcache_core::AddressRecord;
use labelcache_core::ChainId;
use labelcache_core::RecordStore;
use labelcache_core::StoreError;
use labelcache_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` record store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::Corrupt(message) => {
                Self::Invalid(format!("corrupt record: {message}"))
            }
            SqliteStoreError::VersionMismatch(message) => {
                Self::Invalid(format!("schema version mismatch: {message}"))
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a rusqlite error into the store error space.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed record store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Batch upserts commit in one transaction or not at all.
#[derive(Debug)]
pub struct SqliteRecordStore {
    /// Shared connection guarded by a mutex.
    connection: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Opens an `SQLite`-backed record store, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Opens an existing store without creating files, directories, or schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Io`] when the file does not exist, and
    /// [`SqliteStoreError::Invalid`] or [`SqliteStoreError::VersionMismatch`]
    /// when it does not hold a store schema.
    pub fn open_existing(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        if !config.path.is_file() {
            return Err(SqliteStoreError::Io(format!(
                "store file not found: {}",
                config.path.display()
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection =
            Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
        verify_schema(&connection)?;
        apply_pragmas(&connection, config)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Returns the active `journal_mode` pragma value.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the pragma cannot be read.
    pub fn journal_mode(&self) -> Result<String, SqliteStoreError> {
        let guard = self.lock()?;
        guard.query_row("PRAGMA journal_mode;", [], |row| row.get(0)).map_err(|err| db_error(&err))
    }

    /// Lists chains that carry a maintenance marker, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn chains(&self) -> Result<Vec<ChainId>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached("SELECT chain_id FROM maintenance ORDER BY chain_id ASC")
            .map_err(|err| db_error(&err))?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0)).map_err(|err| db_error(&err))?;
        let mut chains = Vec::new();
        for row in rows {
            chains.push(chain_from_sql(row.map_err(|err| db_error(&err))?)?);
        }
        Ok(chains)
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Reads the maintenance marker for `chain`.
    fn read_maintenance_time(&self, chain: ChainId) -> Result<Option<Timestamp>, SqliteStoreError> {
        let chain_id = chain_to_sql(chain)?;
        let guard = self.lock()?;
        let value: Option<i64> = guard
            .query_row(
                "SELECT maintenance_time FROM maintenance WHERE chain_id = ?1",
                params![chain_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        Ok(value.map(Timestamp::from_unix_seconds))
    }

    /// Writes the maintenance marker for `chain`.
    fn write_maintenance_time(&self, chain: ChainId, at: Timestamp) -> Result<(), SqliteStoreError> {
        let chain_id = chain_to_sql(chain)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO maintenance (chain_id, maintenance_time) VALUES (?1, ?2)
                 ON CONFLICT(chain_id) DO UPDATE SET maintenance_time = excluded.maintenance_time",
                params![chain_id, at.as_unix_seconds()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    /// Counts records for `chain`.
    fn read_record_count(&self, chain: ChainId) -> Result<u64, SqliteStoreError> {
        let chain_id = chain_to_sql(chain)?;
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM info WHERE chain_id = ?1", params![chain_id], |row| {
                row.get(0)
            })
            .map_err(|err| db_error(&err))?;
        u64::try_from(count).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
    }

    /// Reads one record.
    fn read_record(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<AddressRecord>, SqliteStoreError> {
        let chain_id = chain_to_sql(chain)?;
        let guard = self.lock()?;
        let row: Option<(String, String, String, String)> = guard
            .query_row(
                "SELECT name, label, label_type, label_subtype
                 FROM info WHERE chain_id = ?1 AND address = ?2",
                params![chain_id, address.to_canonical()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        Ok(row.map(|(name, label, label_type, label_subtype)| AddressRecord {
            chain,
            address: *address,
            name,
            label,
            label_type,
            label_subtype,
        }))
    }

    /// Writes a batch of records in one transaction.
    fn write_records(&self, records: &[AddressRecord]) -> Result<(), SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO info (chain_id, address, name, label, label_type, label_subtype)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(chain_id, address) DO UPDATE SET
                        name = excluded.name,
                        label = excluded.label,
                        label_type = excluded.label_type,
                        label_subtype = excluded.label_subtype",
                )
                .map_err(|err| db_error(&err))?;
            for record in records {
                stmt.execute(params![
                    chain_to_sql(record.chain)?,
                    record.address.to_canonical(),
                    record.name,
                    record.label,
                    record.label_type,
                    record.label_subtype,
                ])
                .map_err(|err| db_error(&err))?;
            }
        }
        tx.commit().map_err(|err| db_error(&err))
    }
}

impl RecordStore for SqliteRecordStore {
    fn get_maintenance_time(&self, chain: ChainId) -> Result<Option<Timestamp>, StoreError> {
        self.read_maintenance_time(chain).map_err(StoreError::from)
    }

    fn set_maintenance_time(&self, chain: ChainId, at: Timestamp) -> Result<(), StoreError> {
        self.write_maintenance_time(chain, at).map_err(StoreError::from)
    }

    fn count_records(&self, chain: ChainId) -> Result<u64, StoreError> {
        self.read_record_count(chain).map_err(StoreError::from)
    }

    fn get_record(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<AddressRecord>, StoreError> {
        self.read_record(chain, address).map_err(StoreError::from)
    }

    fn upsert_records(&self, records: &[AddressRecord]) -> Result<(), StoreError> {
        self.write_records(records).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a chain id into an `SQLite` integer.
fn chain_to_sql(chain: ChainId) -> Result<i64, SqliteStoreError> {
    i64::try_from(chain.get())
        .map_err(|_| SqliteStoreError::Invalid(format!("chain id {chain} exceeds sqlite range")))
}

/// Converts an `SQLite` integer into a chain id.
fn chain_from_sql(value: i64) -> Result<ChainId, SqliteStoreError> {
    u64::try_from(value)
        .map(ChainId::new)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative chain id {value}")))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens or creates an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal, sync, and busy-timeout settings.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    let _mode: String = connection
        .query_row(
            &format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()),
            [],
            |row| row.get(0),
        )
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Checks that an existing database carries the current store schema.
fn verify_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    let has_meta: bool = connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'store_meta')",
            params![],
            |row| row.get(0),
        )
        .map_err(|err| db_error(&err))?;
    if !has_meta {
        return Err(SqliteStoreError::Invalid("database is not a label store".to_string()));
    }
    let version: Option<i64> = connection
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        Some(SCHEMA_VERSION) => Ok(()),
        Some(other) => Err(SqliteStoreError::VersionMismatch(format!(
            "expected schema version {SCHEMA_VERSION}, found {other}"
        ))),
        None => Err(SqliteStoreError::Invalid("store schema version is missing".to_string())),
    }
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS maintenance (
                    chain_id INTEGER NOT NULL,
                    maintenance_time INTEGER NOT NULL,
                    PRIMARY KEY (chain_id)
                ) WITHOUT ROWID;
                CREATE TABLE IF NOT EXISTS info (
                    chain_id INTEGER NOT NULL,
                    address TEXT NOT NULL,
                    name TEXT NOT NULL,
                    label TEXT NOT NULL,
                    label_type TEXT NOT NULL,
                    label_subtype TEXT NOT NULL,
                    PRIMARY KEY (chain_id, address)
                ) WITHOUT ROWID;",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "expected schema version {SCHEMA_VERSION}, found {other}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))
}
