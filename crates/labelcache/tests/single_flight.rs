// crates/labelcache/tests/single_flight.rs
// ============================================================================
// Module: Single-Flight Tests
// Description: Overlapping refresh attempts against one gate.
// Purpose: Ensure a second run starts only after the first fully completes.
// ============================================================================

//! ## Overview
//! Holds the first run inside its first poll, starts a second run from
//! another thread, and checks the second stays blocked until the first has
//! stamped its chain and its worker has exited. Engines built over one
//! shared [`RefreshGate`] serialize the same way.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use labelcache::NullSink;
use labelcache::RefreshContext;
use labelcache::RefreshEngine;
use labelcache::RefreshGate;
use labelcache_core::ChainId;
use labelcache_core::QueryJobClient;
use labelcache_core::RecordStore;

use crate::common::Call;
use crate::common::FailingStore;
use crate::common::Script;
use crate::common::ScriptedJobClient;
use crate::common::chain;
use crate::common::engine;
use crate::common::journal;
use crate::common::labeled_row;
use crate::common::test_policy;

fn wait_for_first_poll(client: &ScriptedJobClient) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !client.calls().iter().any(|call| matches!(call, Call::Poll(_))) {
        assert!(Instant::now() < deadline, "first run never polled");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn second_run_waits_for_first_to_finish() {
    let log = journal();
    let (release_tx, release_rx) = mpsc::channel();
    let client = Arc::new(
        ScriptedJobClient::new()
            .with_script("sql-1", Script::new("run", vec![vec![labeled_row(1, "a")]]))
            .with_journal(Arc::clone(&log))
            .with_poll_gate(release_rx),
    );
    let store = Arc::new(FailingStore::new().with_journal(Arc::clone(&log)));
    let engine = engine(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::clone(&client) as Arc<dyn QueryJobClient>,
        vec![chain(1)],
        test_policy(),
    );

    let first = engine.refresh_async().unwrap();
    wait_for_first_poll(&client);
    assert!(engine.gate().is_busy());
    assert!(engine.gate().try_acquire().is_none());

    let (started_tx, started_rx) = mpsc::channel();
    let second_engine = engine.clone();
    let second = thread::spawn(move || {
        let run = second_engine.refresh_async().unwrap();
        started_tx.send(()).unwrap();
        run.wait(&NullSink)
    });
    assert!(started_rx.recv_timeout(Duration::from_millis(200)).is_err());

    release_tx.send(()).unwrap();
    first.wait(&NullSink).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    second.join().unwrap().unwrap();

    let phases: Vec<&str> = log
        .lock()
        .unwrap()
        .iter()
        .filter_map(|entry| {
            if entry.starts_with("client:Submit") {
                Some("submit")
            } else if entry.starts_with("store:upsert") {
                Some("upsert")
            } else if entry.starts_with("store:stamp") {
                Some("stamp")
            } else {
                None
            }
        })
        .collect();
    assert_eq!(phases, vec!["submit", "upsert", "stamp", "submit", "upsert", "stamp"]);
    assert_eq!(store.count_records(ChainId::new(1)).unwrap(), 1);
    assert!(!engine.gate().is_busy());
}

#[test]
fn gate_reopens_after_failed_run() {
    let mut script = Script::new("run", Vec::new());
    script.submit_fails = true;
    let client = Arc::new(ScriptedJobClient::new().with_script("sql-1", script));
    let store = Arc::new(FailingStore::new());
    let engine = engine(
        store as Arc<dyn RecordStore>,
        Arc::clone(&client) as Arc<dyn QueryJobClient>,
        vec![chain(1)],
        test_policy(),
    );

    assert!(engine.refresh_sync(&NullSink).is_err());
    assert!(!engine.gate().is_busy());
    assert!(engine.refresh_sync(&NullSink).is_err());
    assert_eq!(client.submitted().len(), 2);
}

#[test]
fn dropped_run_still_releases_gate() {
    let client = Arc::new(
        ScriptedJobClient::new()
            .with_script("sql-1", Script::new("run", vec![vec![labeled_row(1, "a")]])),
    );
    let store = Arc::new(FailingStore::new());
    let engine = engine(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        client as Arc<dyn QueryJobClient>,
        vec![chain(1)],
        test_policy(),
    );

    drop(engine.refresh_async().unwrap());
    let report = engine.refresh_async().unwrap().finish().unwrap();
    assert_eq!(report.chains.len(), 1);
    assert_eq!(store.count_records(ChainId::new(1)).unwrap(), 1);
}

#[test]
fn engines_sharing_a_gate_run_one_at_a_time() {
    let (release_tx, release_rx) = mpsc::channel();
    let held_client = Arc::new(
        ScriptedJobClient::new()
            .with_script("sql-1", Script::new("run-a", vec![vec![labeled_row(1, "a")]]))
            .with_poll_gate(release_rx),
    );
    let other_client = Arc::new(
        ScriptedJobClient::new()
            .with_script("sql-56", Script::new("run-b", vec![vec![labeled_row(2, "b")]])),
    );
    let store = Arc::new(FailingStore::new());
    let gate = Arc::new(RefreshGate::new());
    let held = RefreshEngine::with_gate(
        RefreshContext {
            store: Arc::clone(&store) as Arc<dyn RecordStore>,
            client: Arc::clone(&held_client) as Arc<dyn QueryJobClient>,
            chains: vec![chain(1)],
            policy: test_policy(),
        },
        Arc::clone(&gate),
    );
    let other = RefreshEngine::with_gate(
        RefreshContext {
            store: Arc::clone(&store) as Arc<dyn RecordStore>,
            client: Arc::clone(&other_client) as Arc<dyn QueryJobClient>,
            chains: vec![chain(56)],
            policy: test_policy(),
        },
        Arc::clone(&gate),
    );

    let first = held.refresh_async().unwrap();
    wait_for_first_poll(&held_client);
    assert!(!first.is_finished());
    assert!(other.gate().is_busy());

    let second = thread::spawn(move || other.refresh_sync(&NullSink));
    thread::sleep(Duration::from_millis(100));
    assert!(other_client.submitted().is_empty());

    release_tx.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !first.is_finished() {
        assert!(Instant::now() < deadline, "first run never finished");
        thread::sleep(Duration::from_millis(5));
    }
    first.finish().unwrap();
    second.join().unwrap().unwrap();

    assert_eq!(other_client.submitted(), vec!["sql-56".to_string()]);
    assert_eq!(store.count_records(ChainId::new(1)).unwrap(), 1);
    assert_eq!(store.count_records(ChainId::new(56)).unwrap(), 1);
    assert!(!gate.is_busy());
}
