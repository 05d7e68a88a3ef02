// crates/labelcache-config/src/config.rs
// ============================================================================
// Module: Label Cache Configuration
// Description: Configuration loading and validation for the label cache.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: labelcache-core, labelcache-flipside, labelcache-store-sqlite,
//               serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional. Resolution order is the explicit path, then
//! the `LABELCACHE_CONFIG` environment variable, then `labelcache.toml` in
//! the working directory. Only the last may be missing, in which case the
//! built-in defaults apply.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use labelcache_core::ChainId;
use labelcache_core::ChainQuery;
use labelcache_core::RefreshPolicy;
use labelcache_core::default_chain_queries;
use labelcache_flipside::DEFAULT_ENDPOINT;
use labelcache_flipside::FlipsideClientConfig;
use labelcache_flipside::RetryPolicy;
use labelcache_store_sqlite::SqliteStoreConfig;
use labelcache_store_sqlite::SqliteStoreMode;
use labelcache_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "labelcache.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LABELCACHE_CONFIG";
/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "FLIPSIDE_API_KEY";
/// Default `SQLite` file name.
pub const DEFAULT_STORE_PATH: &str = "addressInf0.db";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured chains.
const MAX_CHAINS: usize = 64;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Root `labelcache.toml` model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCacheConfig {
    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Remote query service settings.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Refresh orchestration settings.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Chains refreshed in order; defaults to ethereum, bsc, and base.
    #[serde(default = "default_chains")]
    pub chains: Vec<ChainConfig>,
}

impl Default for LabelCacheConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            remote: RemoteConfig::default(),
            refresh: RefreshConfig::default(),
            chains: default_chains(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `SQLite` database path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// `[remote]` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// JSON-RPC endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Inline API key; takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Rows requested per result page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Attempts per remote call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Hours the remote keeps results.
    #[serde(default = "default_result_ttl_hours")]
    pub result_ttl_hours: u32,
    /// Maximum age of cached remote results, in minutes.
    #[serde(default)]
    pub max_age_minutes: u32,
    /// Remote data source.
    #[serde(default = "default_data_source")]
    pub data_source: String,
    /// Remote data provider.
    #[serde(default = "default_data_provider")]
    pub data_provider: String,
    /// Allow cleartext HTTP endpoints.
    #[serde(default)]
    pub allow_http: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            page_size: default_page_size(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            result_ttl_hours: default_result_ttl_hours(),
            max_age_minutes: 0,
            data_source: default_data_source(),
            data_provider: default_data_provider(),
            allow_http: false,
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("timeout_ms", &self.timeout_ms)
            .field("page_size", &self.page_size)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("result_ttl_hours", &self.result_ttl_hours)
            .field("max_age_minutes", &self.max_age_minutes)
            .field("data_source", &self.data_source)
            .field("data_provider", &self.data_provider)
            .field("allow_http", &self.allow_http)
            .finish()
    }
}

/// `[refresh]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Wall-clock bound on polling one job, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Pause between poll iterations, in milliseconds.
    #[serde(default)]
    pub poll_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            poll_interval_ms: 0,
        }
    }
}

/// `[[chains]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Numeric chain id.
    pub chain_id: u64,
    /// Chain name used in logs.
    pub name: String,
    /// SQL submitted for this chain.
    pub sql: String,
}

// ============================================================================
// SECTION: Loading and Validation
// ============================================================================

impl LabelCacheConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let source = resolve_path(path, env::var(CONFIG_ENV_VAR).ok())?;
        Self::load_source(&source)
    }

    /// Loads configuration from an already-resolved source.
    fn load_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        let path = source.path();
        validate_path(path)?;
        if matches!(source, ConfigSource::Default(_)) && !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.remote.validate()?;
        self.refresh.validate()?;
        validate_chains(&self.chains)
    }

    /// Returns the `SQLite` store configuration.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.store.path.clone(),
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
        }
    }

    /// Returns the orchestrator policy.
    #[must_use]
    pub const fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            poll_timeout: Duration::from_millis(self.refresh.poll_timeout_ms),
            poll_interval: Duration::from_millis(self.refresh.poll_interval_ms),
            page_size: self.remote.page_size,
        }
    }

    /// Returns the configured chains in refresh order.
    #[must_use]
    pub fn chain_queries(&self) -> Vec<ChainQuery> {
        self.chains
            .iter()
            .map(|chain| {
                ChainQuery::new(ChainId::new(chain.chain_id), chain.name.clone(), chain.sql.clone())
            })
            .collect()
    }

    /// Builds the remote client configuration, resolving the API key from the
    /// process environment when no inline key is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when no key is available.
    pub fn client_config(&self) -> Result<FlipsideClientConfig, ConfigError> {
        self.client_config_with(|name| env::var(name).ok())
    }

    /// Builds the remote client configuration with an explicit env lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when no key is available.
    pub fn client_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<FlipsideClientConfig, ConfigError> {
        let api_key = self.remote.resolve_api_key(lookup)?;
        Ok(self.client_config_for_key(api_key))
    }

    /// Builds the remote client configuration around a caller-supplied key.
    #[must_use]
    pub fn client_config_for_key(&self, api_key: String) -> FlipsideClientConfig {
        let remote = &self.remote;
        FlipsideClientConfig {
            endpoint: remote.endpoint.clone(),
            api_key,
            timeout_ms: remote.timeout_ms,
            allow_http: remote.allow_http,
            result_ttl_hours: remote.result_ttl_hours,
            max_age_minutes: remote.max_age_minutes,
            data_source: remote.data_source.clone(),
            data_provider: remote.data_provider.clone(),
            retry: RetryPolicy {
                max_attempts: remote.max_attempts,
                delay: Duration::from_millis(remote.retry_delay_ms),
            },
            ..FlipsideClientConfig::default()
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("store.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl RemoteConfig {
    /// Validates remote configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Invalid("remote.endpoint must be non-empty".to_string()));
        }
        let cleartext = endpoint.starts_with("http://");
        if !endpoint.starts_with("https://") && !(cleartext && self.allow_http) {
            return Err(ConfigError::Invalid(
                "remote.endpoint must use https (or http with allow_http)".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "remote.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid(
                "remote.page_size must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "remote.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.api_key_env.trim().is_empty() && self.api_key.is_none() {
            return Err(ConfigError::Invalid(
                "remote.api_key_env must be non-empty when api_key is unset".to_string(),
            ));
        }
        if self.data_source.trim().is_empty() || self.data_provider.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "remote.data_source and remote.data_provider must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the API key from the inline value or the named env variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when no non-empty key exists.
    pub fn resolve_api_key(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_ref().filter(|key| !key.trim().is_empty()) {
            return Ok(key.clone());
        }
        lookup(&self.api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(self.api_key_env.clone()))
    }
}

impl RefreshConfig {
    /// Validates refresh configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh.poll_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms >= self.poll_timeout_ms {
            return Err(ConfigError::Invalid(
                "refresh.poll_interval_ms must be less than poll_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// No API key was configured or found in the environment.
    #[error("missing api key: set remote.api_key or the {0} environment variable")]
    MissingCredential(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Where the configuration path came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigSource {
    /// Path given by the caller or the environment; must exist.
    Explicit(PathBuf),
    /// Default file name; may be absent.
    Default(PathBuf),
}

impl ConfigSource {
    /// Returns the resolved path.
    fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Default(path) => path,
        }
    }
}

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>, env_path: Option<String>) -> Result<ConfigSource, ConfigError> {
    if let Some(path) = path {
        return Ok(ConfigSource::Explicit(path.to_path_buf()));
    }
    if let Some(env_path) = env_path.filter(|value| !value.trim().is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ConfigSource::Explicit(PathBuf::from(env_path)));
    }
    Ok(ConfigSource::Default(PathBuf::from(DEFAULT_CONFIG_NAME)))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates the chain list.
fn validate_chains(chains: &[ChainConfig]) -> Result<(), ConfigError> {
    if chains.is_empty() {
        return Err(ConfigError::Invalid("at least one chain must be configured".to_string()));
    }
    if chains.len() > MAX_CHAINS {
        return Err(ConfigError::Invalid(format!("too many chains (max {MAX_CHAINS})")));
    }
    let mut seen = BTreeSet::new();
    for chain in chains {
        if !seen.insert(chain.chain_id) {
            return Err(ConfigError::Invalid(format!("duplicate chain_id {}", chain.chain_id)));
        }
        if i64::try_from(chain.chain_id).is_err() {
            return Err(ConfigError::Invalid(format!("chain_id {} out of range", chain.chain_id)));
        }
        if chain.name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "chain {} name must be non-empty",
                chain.chain_id
            )));
        }
        if chain.sql.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "chain {} sql must be non-empty",
                chain.chain_id
            )));
        }
    }
    Ok(())
}

/// Default chain list.
fn default_chains() -> Vec<ChainConfig> {
    default_chain_queries()
        .into_iter()
        .map(|query| ChainConfig {
            chain_id: query.chain.get(),
            name: query.name,
            sql: query.sql,
        })
        .collect()
}

/// Default store path.
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Default endpoint.
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Default API key variable.
fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

/// Default request timeout.
const fn default_timeout_ms() -> u64 {
    120_000
}

/// Default page size.
const fn default_page_size() -> u32 {
    labelcache_core::DEFAULT_PAGE_SIZE
}

/// Default attempts per call.
const fn default_max_attempts() -> u32 {
    10
}

/// Default retry delay.
const fn default_retry_delay_ms() -> u64 {
    1_000
}

/// Default result TTL.
const fn default_result_ttl_hours() -> u32 {
    1
}

/// Default data source.
fn default_data_source() -> String {
    "snowflake-default".to_string()
}

/// Default data provider.
fn default_data_provider() -> String {
    "flipside".to_string()
}

/// Default poll timeout.
const fn default_poll_timeout_ms() -> u64 {
    5 * 60 * 1_000
}

// ============================================================================
// SECTION: Tests
// ============================================================================
