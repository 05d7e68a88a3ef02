// crates/labelcache-flipside/tests/flipside_client_unit.rs
// ============================================================================
// Module: Flipside Client Unit Tests
// Description: Tests for the JSON-RPC query-job client against a local stub.
// Purpose: Verify request envelopes, state mapping, paging, and retries.
// ============================================================================

//! ## Overview
//! Runs the real [`FlipsideClient`] against a `tiny_http` server that scripts
//! JSON-RPC responses:
//! - Envelope shape, positional params, and the API key header
//! - Empty run handles fail without retry
//! - Remote run states map to ready, not-ready, or fatal
//! - Transient HTTP and JSON-RPC errors are retried up to the budget

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use labelcache_core::JobClientError;
use labelcache_core::JobHandle;
use labelcache_core::PollStatus;
use labelcache_core::QueryJobClient;
use labelcache_flipside::FlipsideClient;
use labelcache_flipside::FlipsideClientConfig;
use labelcache_flipside::RetryPolicy;
use serde_json::Value;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Request observed by the stub server.
#[derive(Debug, Clone)]
struct Captured {
    body: Value,
    api_key: Option<String>,
}

/// Starts a stub JSON-RPC server; returns its endpoint and the request log.
fn stub_server<F>(handler: F) -> (String, Arc<Mutex<Vec<Captured>>>)
where
    F: Fn(usize, &Value) -> (u16, Value) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let thread_log = Arc::clone(&log);
    thread::spawn(move || {
        let mut index = 0;
        while let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(5)) {
            let mut raw = String::new();
            request.as_reader().read_to_string(&mut raw).unwrap();
            let body: Value = serde_json::from_str(&raw).unwrap();
            let api_key = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("x-api-key"))
                .map(|header| header.value.as_str().to_string());
            let (status, reply) = handler(index, &body);
            thread_log.lock().unwrap().push(Captured {
                body,
                api_key,
            });
            index += 1;
            let response = Response::from_string(reply.to_string()).with_status_code(status);
            let _ = request.respond(response);
        }
    });
    (format!("http://{addr}/json-rpc"), log)
}

fn client_for(endpoint: String, max_attempts: u32) -> FlipsideClient {
    FlipsideClient::new(FlipsideClientConfig {
        endpoint,
        api_key: "test-key".to_string(),
        allow_http: true,
        timeout_ms: 5_000,
        retry: RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        },
        ..FlipsideClientConfig::default()
    })
    .unwrap()
}

/// Starts a server that holds each request for `stall` before answering.
fn stalled_server(stall: Duration) -> (String, Arc<Mutex<usize>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let seen = Arc::new(Mutex::new(0));
    let thread_seen = Arc::clone(&seen);
    thread::spawn(move || {
        while let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(5)) {
            *thread_seen.lock().unwrap() += 1;
            thread::sleep(stall);
            let _ = request.respond(Response::from_string("{}"));
        }
    });
    (format!("http://{addr}/json-rpc"), seen)
}

/// A poll deadline far enough out to never matter.
fn later() -> Instant {
    Instant::now() + Duration::from_secs(60)
}

fn rpc_result(body: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": body["id"].clone(), "result": result })
}

fn rpc_error(body: &Value, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": body["id"].clone(), "error": { "code": -32000, "message": message } })
}

fn run_state(body: &Value, state: &str) -> Value {
    rpc_result(body, json!({ "queryRun": { "id": "run-1", "state": state, "errorMessage": "boom" } }))
}

// ============================================================================
// SECTION: Submit
// ============================================================================

#[test]
fn submit_sends_positional_params_and_api_key() {
    let (endpoint, log) = stub_server(|_, body| {
        (200, rpc_result(body, json!({ "queryRequest": { "queryRunId": "run-42" } })))
    });
    let client = client_for(endpoint, 3);

    let handle = client.submit("SELECT 1;").unwrap();
    assert_eq!(handle, JobHandle::new("run-42"));

    let captured = log.lock().unwrap().clone();
    assert_eq!(captured.len(), 1);
    let body = &captured[0].body;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "createQueryRun");
    assert_eq!(
        body["params"],
        json!([{
            "resultTTLHours": 1,
            "maxAgeMinutes": 0,
            "sql": "SELECT 1;",
            "dataSource": "snowflake-default",
            "dataProvider": "flipside",
        }])
    );
    assert_eq!(captured[0].api_key.as_deref(), Some("test-key"));
}

#[test]
fn submit_empty_handle_fails_without_retry() {
    let (endpoint, log) = stub_server(|_, body| {
        (200, rpc_result(body, json!({ "queryRequest": { "queryRunId": "" } })))
    });
    let client = client_for(endpoint, 5);

    let err = client.submit("SELECT 1;").unwrap_err();
    assert!(matches!(err, JobClientError::EmptyHandle), "unexpected error: {err}");
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn submit_missing_query_request_is_empty_handle() {
    let (endpoint, _log) = stub_server(|_, body| (200, rpc_result(body, json!({}))));
    let client = client_for(endpoint, 2);
    assert!(matches!(client.submit("SELECT 1;"), Err(JobClientError::EmptyHandle)));
}

#[test]
fn request_ids_increase() {
    let (endpoint, log) = stub_server(|_, body| {
        (200, rpc_result(body, json!({ "queryRequest": { "queryRunId": "run" } })))
    });
    let client = client_for(endpoint, 1);
    client.submit("a").unwrap();
    client.submit("b").unwrap();
    let ids: Vec<u64> =
        log.lock().unwrap().iter().map(|entry| entry.body["id"].as_u64().unwrap()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids[1] > ids[0]);
}

// ============================================================================
// SECTION: Poll
// ============================================================================

#[test]
fn poll_maps_remote_states() {
    let (endpoint, log) = stub_server(|index, body| {
        let state = match index {
            0 => "QUERY_STATE_RUNNING",
            1 => "QUERY_STATE_SUCCESS",
            _ => "QUERY_STATE_FAILED",
        };
        (200, run_state(body, state))
    });
    let client = client_for(endpoint, 1);
    let handle = JobHandle::new("run-1");

    assert_eq!(client.poll(&handle, later()).unwrap(), PollStatus::NotReady);
    assert_eq!(client.poll(&handle, later()).unwrap(), PollStatus::Ready);
    let err = client.poll(&handle, later()).unwrap_err();
    assert!(err.is_fatal());
    let JobClientError::QueryFailed {
        state,
        message,
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(state, "QUERY_STATE_FAILED");
    assert_eq!(message, "boom");

    let captured = log.lock().unwrap().clone();
    assert_eq!(captured[0].body["method"], "getQueryRun");
    assert_eq!(captured[0].body["params"], json!([{ "queryRunId": "run-1" }]));
}

#[test]
fn poll_canceled_state_is_fatal() {
    let (endpoint, _log) =
        stub_server(|_, body| (200, run_state(body, "QUERY_STATE_CANCELED")));
    let client = client_for(endpoint, 3);
    let err = client.poll(&JobHandle::new("run-1"), later()).unwrap_err();
    assert!(matches!(err, JobClientError::QueryFailed { .. }));
}

#[test]
fn poll_returns_by_deadline_against_stalled_endpoint() {
    let (endpoint, seen) = stalled_server(Duration::from_secs(3));
    let client = FlipsideClient::new(FlipsideClientConfig {
        endpoint,
        api_key: "test-key".to_string(),
        allow_http: true,
        timeout_ms: 120_000,
        retry: RetryPolicy {
            max_attempts: 10,
            delay: Duration::from_millis(50),
        },
        ..FlipsideClientConfig::default()
    })
    .unwrap();

    let started = Instant::now();
    let err = client.poll(&JobHandle::new("run-1"), started + Duration::from_millis(300)).unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(1_500), "poll overran its deadline: {elapsed:?}");
    assert!(!err.is_fatal());
    assert!(
        matches!(err, JobClientError::DeadlineExceeded { ref operation, .. } if operation == "getQueryRun"),
        "unexpected error: {err}"
    );
    assert_eq!(*seen.lock().unwrap(), 1);
}

// ============================================================================
// SECTION: Fetch
// ============================================================================

#[test]
fn fetch_page_parses_rows_and_paging() {
    let (endpoint, log) = stub_server(|_, body| {
        (
            200,
            rpc_result(
                body,
                json!({
                    "columnNames": ["address", "label"],
                    "rows": [
                        {
                            "address": "0x00000000000000000000000000000000000000AA",
                            "address_name": "binance 14",
                            "label_type": "cex",
                            "label_subtype": "hot_wallet",
                            "label": "binance",
                            "project_name": null
                        },
                        { "address": "0x00000000000000000000000000000000000000bb", "project_name": "uniswap" }
                    ],
                    "page": {
                        "currentPageNumber": 2,
                        "currentPageSize": 2,
                        "totalRows": 5,
                        "totalPages": 3
                    }
                }),
            ),
        )
    });
    let client = client_for(endpoint, 1);

    let page = client.fetch_page(&JobHandle::new("run-9"), 2, 2).unwrap();
    assert_eq!(page.page_number, 2);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].label.as_deref(), Some("binance"));
    assert_eq!(page.rows[1].label, None);
    assert_eq!(page.rows[1].project_name.as_deref(), Some("uniswap"));

    let captured = log.lock().unwrap().clone();
    assert_eq!(captured[0].body["method"], "getQueryRunResults");
    assert_eq!(
        captured[0].body["params"],
        json!([{ "queryRunId": "run-9", "format": "json", "page": { "number": 2, "size": 2 } }])
    );
}

#[test]
fn fetch_page_null_rows_is_empty() {
    let (endpoint, _log) = stub_server(|_, body| {
        (
            200,
            rpc_result(body, json!({ "rows": null, "page": { "currentPageNumber": 1, "totalPages": 0 } })),
        )
    });
    let client = client_for(endpoint, 1);
    let page = client.fetch_page(&JobHandle::new("run"), 1, 100_000).unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total_pages, 0);
}

// ============================================================================
// SECTION: Retries
// ============================================================================

#[test]
fn transient_http_failures_are_retried() {
    let (endpoint, log) = stub_server(|index, body| {
        if index < 2 {
            (503, json!({ "error": "unavailable" }))
        } else {
            (200, rpc_result(body, json!({ "queryRequest": { "queryRunId": "run-7" } })))
        }
    });
    let client = client_for(endpoint, 5);
    assert_eq!(client.submit("SELECT 1;").unwrap(), JobHandle::new("run-7"));
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn persistent_rpc_errors_exhaust_retries() {
    let (endpoint, log) =
        stub_server(|_, body| (200, rpc_error(body, "rate limit exceeded")));
    let client = client_for(endpoint, 3);

    let err = client.poll(&JobHandle::new("run-1"), later()).unwrap_err();
    assert!(!err.is_fatal());
    let JobClientError::RetriesExhausted {
        operation,
        attempts,
        last_error,
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(operation, "getQueryRun");
    assert_eq!(*attempts, 3);
    assert!(last_error.contains("rate limit exceeded"));
    assert_eq!(log.lock().unwrap().len(), 3);
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

#[test]
fn cleartext_endpoint_requires_opt_in() {
    let err = FlipsideClient::new(FlipsideClientConfig {
        endpoint: "http://127.0.0.1:1/json-rpc".to_string(),
        api_key: "key".to_string(),
        ..FlipsideClientConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, JobClientError::Config(_)));
}

#[test]
fn empty_api_key_is_rejected() {
    let err = FlipsideClient::new(FlipsideClientConfig::default()).unwrap_err();
    assert!(matches!(err, JobClientError::Config(_)));
}

#[test]
fn debug_output_redacts_api_key() {
    let config = FlipsideClientConfig {
        api_key: "super-secret".to_string(),
        ..FlipsideClientConfig::default()
    };
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("<redacted>"));
}
