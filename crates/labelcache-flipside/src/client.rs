// crates/labelcache-flipside/src/client.rs
// ============================================================================
// Module: Flipside JSON-RPC Client
// Description: Blocking JSON-RPC client for Flipside query runs.
// Purpose: Implement QueryJobClient over createQueryRun, getQueryRun, and
//          getQueryRunResults.
// Dependencies: labelcache-core, reqwest, serde, serde_json
// ============================================================================

//! ## Overview
//! [`FlipsideClient`] posts JSON-RPC 2.0 envelopes with a single positional
//! parameter object and authenticates with the `x-api-key` header. Responses
//! are size-limited and parsed strictly; a JSON-RPC `error` member becomes a
//! retryable [`JobClientError::Protocol`].
//!
//! Security posture: the API key is never logged and `Debug` output redacts it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Read;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use labelcache_core::JobClientError;
use labelcache_core::JobHandle;
use labelcache_core::LabelRow;
use labelcache_core::PollStatus;
use labelcache_core::QueryJobClient;
use labelcache_core::ResultPage;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

use crate::retry::RetryPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default Flipside JSON-RPC endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api-v2.flipsidecrypto.xyz/json-rpc";
/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-api-key";
/// Remote state reported for a finished run.
const STATE_SUCCESS: &str = "QUERY_STATE_SUCCESS";
/// Remote states that end a run without results.
const TERMINAL_FAILURE_STATES: &[&str] = &["QUERY_STATE_FAILED", "QUERY_STATE_CANCELED"];
/// Default maximum response body size.
const DEFAULT_MAX_RESPONSE_BYTES: usize = 256 * 1024 * 1024;
/// Default request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Method creating a query run.
const METHOD_CREATE: &str = "createQueryRun";
/// Method reading query run status.
const METHOD_STATUS: &str = "getQueryRun";
/// Method reading one page of results.
const METHOD_RESULTS: &str = "getQueryRunResults";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`FlipsideClient`].
///
/// # Invariants
/// - `endpoint` must be `https://` unless `allow_http` is set.
/// - `api_key` must be non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct FlipsideClientConfig {
    /// JSON-RPC endpoint URL.
    pub endpoint: String,
    /// Static API key sent with every request.
    pub api_key: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent string for outbound requests.
    pub user_agent: String,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Hours the remote keeps results.
    pub result_ttl_hours: u32,
    /// Maximum age of cached remote results, in minutes.
    pub max_age_minutes: u32,
    /// Remote data source name.
    pub data_source: String,
    /// Remote data provider name.
    pub data_provider: String,
    /// Retry policy wrapped around every call.
    pub retry: RetryPolicy,
}

impl Default for FlipsideClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: concat!("labelcache/", env!("CARGO_PKG_VERSION")).to_string(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            allow_http: false,
            result_ttl_hours: 1,
            max_age_minutes: 0,
            data_source: "snowflake-default".to_string(),
            data_provider: "flipside".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for FlipsideClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlipsideClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("allow_http", &self.allow_http)
            .field("result_ttl_hours", &self.result_ttl_hours)
            .field("max_age_minutes", &self.max_age_minutes)
            .field("data_source", &self.data_source)
            .field("data_provider", &self.data_provider)
            .field("retry", &self.retry)
            .finish()
    }
}

// ============================================================================
// SECTION: JSON-RPC Structures
// ============================================================================

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    /// JSON-RPC version tag.
    jsonrpc: &'static str,
    /// Request identifier.
    id: u64,
    /// Method name to invoke.
    method: &'a str,
    /// Positional parameters.
    params: [Value; 1],
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// Optional result payload.
    result: Option<Value>,
    /// Optional error payload.
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    /// Error code provided by the server.
    #[serde(default)]
    code: i64,
    /// Error message provided by the server.
    message: String,
}

/// `createQueryRun` result payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQueryRunResult {
    /// Query request summary.
    #[serde(default)]
    query_request: Option<QueryRequest>,
}

/// Query request summary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    /// Query run identifier.
    #[serde(default)]
    query_run_id: Option<String>,
}

/// `getQueryRun` result payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetQueryRunResult {
    /// Query run details.
    query_run: QueryRun,
}

/// Query run details.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRun {
    /// Remote run state.
    state: String,
    /// Remote error text for failed runs.
    #[serde(default)]
    error_message: Option<String>,
}

/// `getQueryRunResults` result payload.
#[derive(Debug, Deserialize)]
struct QueryRunResults {
    /// Result rows; `null` means no rows.
    #[serde(default)]
    rows: Option<Vec<LabelRow>>,
    /// Paging metadata.
    page: PageInfo,
}

/// Paging metadata.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    /// One-indexed page number returned.
    current_page_number: u32,
    /// Total pages for the run.
    total_pages: u32,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking Flipside query-job client.
///
/// # Invariants
/// - Request ids are strictly increasing per client.
/// - Every call runs under the configured [`RetryPolicy`].
pub struct FlipsideClient {
    /// Client configuration.
    config: FlipsideClientConfig,
    /// HTTP client used for outbound requests.
    client: Client,
    /// Next JSON-RPC request identifier.
    next_id: AtomicU64,
}

impl fmt::Debug for FlipsideClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlipsideClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl FlipsideClient {
    /// Creates a client after validating the endpoint and credential.
    ///
    /// # Errors
    ///
    /// Returns [`JobClientError::Config`] when the endpoint or key is unusable
    /// or the HTTP client cannot be built.
    pub fn new(config: FlipsideClientConfig) -> Result<Self, JobClientError> {
        validate_endpoint(&config.endpoint, config.allow_http)?;
        if config.api_key.trim().is_empty() {
            return Err(JobClientError::Config("api key must not be empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| JobClientError::Config(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Sends one JSON-RPC call and decodes its `result` member.
    ///
    /// `budget` caps the request timeout below the configured one.
    fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        budget: Option<Duration>,
    ) -> Result<T, JobClientError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: [params],
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|err| JobClientError::Protocol(format!("jsonrpc serialization failed: {err}")))?;
        let mut request = self.client.post(&self.config.endpoint).headers(self.headers()?).body(payload);
        if let Some(budget) = budget {
            request = request.timeout(budget.min(Duration::from_millis(self.config.timeout_ms)));
        }
        let mut response =
            request.send().map_err(|err| JobClientError::Transport(err.to_string()))?;
        let status = response.status();
        let body = read_response_limited(&mut response, self.config.max_response_bytes)?;
        if !status.is_success() {
            let preview = String::from_utf8_lossy(&body);
            return Err(JobClientError::Transport(format!(
                "http status {}: {}",
                status.as_u16(),
                preview.chars().take(256).collect::<String>().trim()
            )));
        }
        let envelope: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|err| JobClientError::Protocol(format!("invalid json-rpc response: {err}")))?;
        if let Some(error) = envelope.error {
            return Err(JobClientError::Protocol(format!(
                "{method} rejected ({}): {}",
                error.code, error.message
            )));
        }
        let result = envelope
            .result
            .ok_or_else(|| JobClientError::Protocol(format!("{method} returned no result")))?;
        serde_json::from_value(result)
            .map_err(|err| JobClientError::Protocol(format!("invalid {method} result: {err}")))
    }

    /// Builds request headers.
    fn headers(&self) -> Result<HeaderMap, JobClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|_| JobClientError::Config("invalid api key header".to_string()))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        Ok(headers)
    }
}

impl QueryJobClient for FlipsideClient {
    fn submit(&self, sql: &str) -> Result<JobHandle, JobClientError> {
        let params = json!({
            "resultTTLHours": self.config.result_ttl_hours,
            "maxAgeMinutes": self.config.max_age_minutes,
            "sql": sql,
            "dataSource": self.config.data_source,
            "dataProvider": self.config.data_provider,
        });
        let result: CreateQueryRunResult =
            self.config.retry.run(METHOD_CREATE, || self.call(METHOD_CREATE, params.clone(), None))?;
        let handle = result
            .query_request
            .and_then(|request| request.query_run_id)
            .map(JobHandle::new)
            .unwrap_or_else(|| JobHandle::new(""));
        if handle.is_empty() {
            return Err(JobClientError::EmptyHandle);
        }
        Ok(handle)
    }

    fn poll(&self, handle: &JobHandle, deadline: Instant) -> Result<PollStatus, JobClientError> {
        let params = json!({ "queryRunId": handle.as_str() });
        let result: GetQueryRunResult = self.config.retry.run_until(METHOD_STATUS, deadline, |budget| {
            self.call(METHOD_STATUS, params.clone(), budget)
        })?;
        classify_state(result.query_run)
    }

    fn fetch_page(
        &self,
        handle: &JobHandle,
        page_number: u32,
        page_size: u32,
    ) -> Result<ResultPage, JobClientError> {
        let params = json!({
            "queryRunId": handle.as_str(),
            "format": "json",
            "page": { "number": page_number, "size": page_size },
        });
        let result: QueryRunResults =
            self.config.retry.run(METHOD_RESULTS, || self.call(METHOD_RESULTS, params.clone(), None))?;
        Ok(ResultPage {
            rows: result.rows.unwrap_or_default(),
            page_number: result.page.current_page_number,
            total_pages: result.page.total_pages,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a remote run state onto a poll outcome.
fn classify_state(run: QueryRun) -> Result<PollStatus, JobClientError> {
    if run.state == STATE_SUCCESS {
        return Ok(PollStatus::Ready);
    }
    if TERMINAL_FAILURE_STATES.contains(&run.state.as_str()) {
        return Err(JobClientError::QueryFailed {
            state: run.state,
            message: run.error_message.unwrap_or_default(),
        });
    }
    Ok(PollStatus::NotReady)
}

/// Validates the endpoint scheme.
fn validate_endpoint(endpoint: &str, allow_http: bool) -> Result<(), JobClientError> {
    let url = Url::parse(endpoint)
        .map_err(|err| JobClientError::Config(format!("invalid endpoint: {err}")))?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_http => Ok(()),
        other => Err(JobClientError::Config(format!("unsupported endpoint scheme: {other}"))),
    }
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut reqwest::blocking::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, JobClientError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| JobClientError::Config("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(JobClientError::Protocol(format!(
            "response exceeds size limit ({expected} > {max_bytes})"
        )));
    }
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|err| JobClientError::Transport(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(JobClientError::Protocol(format!(
            "response exceeds size limit (max {max_bytes})"
        )));
    }
    Ok(buf)
}
