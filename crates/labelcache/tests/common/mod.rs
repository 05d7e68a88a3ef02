// crates/labelcache/tests/common/mod.rs
// ============================================================================
// Module: Refresh Test Collaborators
// Description: Scripted query client and fault-injecting record store.
// Purpose: Drive the refresh engine deterministically without the network.
// ============================================================================

//! ## Overview
//! - [`ScriptedJobClient`] answers submit, poll, and fetch from per-SQL scripts.
//! - [`FailingStore`] wraps the in-memory store with switchable faults.
//! - [`Journal`] records the interleaving of client and store calls.

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;
use std::time::Instant;

use labelcache::RefreshContext;
use labelcache::RefreshEngine;
use labelcache_core::Address;
use labelcache_core::AddressRecord;
use labelcache_core::ChainId;
use labelcache_core::ChainQuery;
use labelcache_core::InMemoryRecordStore;
use labelcache_core::JobClientError;
use labelcache_core::JobHandle;
use labelcache_core::LabelRow;
use labelcache_core::PollStatus;
use labelcache_core::QueryJobClient;
use labelcache_core::RecordStore;
use labelcache_core::RefreshEvent;
use labelcache_core::RefreshPolicy;
use labelcache_core::RefreshStatus;
use labelcache_core::ResultPage;
use labelcache_core::StoreError;
use labelcache_core::Timestamp;

// ============================================================================
// SECTION: Journal
// ============================================================================

/// Shared ordered log of collaborator calls.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Creates an empty journal.
pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn note(journal: Option<&Journal>, entry: String) {
    if let Some(journal) = journal {
        journal.lock().unwrap().push(entry);
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Address whose last byte is `byte`.
pub fn address(byte: u8) -> Address {
    let mut bytes = [0_u8; 20];
    bytes[19] = byte;
    Address::from_bytes(bytes)
}

/// Row with a `label` column.
pub fn labeled_row(byte: u8, label: &str) -> LabelRow {
    LabelRow {
        address: Some(address(byte).to_canonical().to_uppercase().replacen("0X", "0x", 1)),
        address_name: Some(format!("name-{byte}")),
        label_type: Some("cex".to_string()),
        label_subtype: Some("hot_wallet".to_string()),
        label: Some(label.to_string()),
        project_name: Some("ignored-project".to_string()),
    }
}

/// Row with only a `project_name` column.
pub fn project_row(byte: u8, project: &str) -> LabelRow {
    LabelRow {
        address: Some(address(byte).to_canonical()),
        address_name: Some(format!("name-{byte}")),
        label_type: Some("defi".to_string()),
        label_subtype: Some("router".to_string()),
        label: None,
        project_name: Some(project.to_string()),
    }
}

// ============================================================================
// SECTION: Scripted Client
// ============================================================================

/// One scripted poll response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Report ready.
    Ready,
    /// Report not ready.
    NotReady,
    /// Fail with exhausted retries.
    Transient,
    /// Fail with a remote failed state.
    Failed,
    /// Hang for up to the given time, giving up at the caller's deadline.
    Stall(Duration),
}

/// Script for one chain SQL.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Handle returned by submit.
    pub handle: String,
    /// Submit fails with exhausted retries.
    pub submit_fails: bool,
    /// Poll responses in order; `Ready` once exhausted.
    pub polls: VecDeque<PollStep>,
    /// Poll never reports ready.
    pub never_ready: bool,
    /// Rows per page.
    pub pages: Vec<Vec<LabelRow>>,
    /// Reported total page count; defaults to `pages.len()`.
    pub total_pages: Option<u32>,
    /// Page number whose fetch fails.
    pub failing_page: Option<u32>,
}

impl Script {
    /// Script returning `handle` and then the given pages.
    pub fn new(handle: &str, pages: Vec<Vec<LabelRow>>) -> Self {
        Self {
            handle: handle.to_string(),
            pages,
            ..Self::default()
        }
    }

    /// Sets the poll responses.
    pub fn polls(mut self, steps: &[PollStep]) -> Self {
        self.polls = steps.iter().copied().collect();
        self
    }
}

/// Call observed by the scripted client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `submit(sql)`.
    Submit(String),
    /// `poll(handle)`.
    Poll(String),
    /// `fetch_page(handle, page, size)`.
    Fetch(String, u32, u32),
}

/// Query client answering from per-SQL scripts.
#[derive(Default)]
pub struct ScriptedJobClient {
    /// Scripts keyed by SQL text.
    scripts: Mutex<Vec<(String, Script)>>,
    /// Calls observed in order.
    calls: Mutex<Vec<Call>>,
    /// Optional shared journal.
    journal: Option<Journal>,
    /// When set, the first poll waits for a message on this channel.
    poll_gate: Mutex<Option<mpsc::Receiver<()>>>,
    /// Deadlines passed to poll, in order.
    deadlines: Mutex<Vec<Instant>>,
}

impl ScriptedJobClient {
    /// Creates a client with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a script for `sql`.
    pub fn with_script(self, sql: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().push((sql.to_string(), script));
        self
    }

    /// Records calls into `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Blocks the first poll until `release` receives a message.
    pub fn with_poll_gate(self, release: mpsc::Receiver<()>) -> Self {
        *self.poll_gate.lock().unwrap() = Some(release);
        self
    }

    /// Returns the calls observed so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the deadlines passed to poll so far.
    pub fn poll_deadlines(&self) -> Vec<Instant> {
        self.deadlines.lock().unwrap().clone()
    }

    /// Returns the SQL texts submitted so far.
    pub fn submitted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Submit(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        note(self.journal.as_ref(), format!("client:{call:?}"));
        self.calls.lock().unwrap().push(call);
    }

    fn with_handle<T>(&self, handle: &JobHandle, apply: impl FnOnce(&mut Script) -> T) -> T {
        let mut scripts = self.scripts.lock().unwrap();
        let (_, script) = scripts
            .iter_mut()
            .find(|(_, script)| script.handle == handle.as_str())
            .unwrap_or_else(|| panic!("no script for handle {handle}"));
        apply(script)
    }
}

impl QueryJobClient for ScriptedJobClient {
    fn submit(&self, sql: &str) -> Result<JobHandle, JobClientError> {
        self.record(Call::Submit(sql.to_string()));
        let scripts = self.scripts.lock().unwrap();
        let (_, script) = scripts
            .iter()
            .find(|(key, _)| key == sql)
            .unwrap_or_else(|| panic!("no script for sql {sql}"));
        if script.submit_fails {
            return Err(JobClientError::RetriesExhausted {
                operation: "createQueryRun".to_string(),
                attempts: 10,
                last_error: "connection refused".to_string(),
            });
        }
        Ok(JobHandle::new(script.handle.clone()))
    }

    fn poll(&self, handle: &JobHandle, deadline: Instant) -> Result<PollStatus, JobClientError> {
        self.record(Call::Poll(handle.to_string()));
        self.deadlines.lock().unwrap().push(deadline);
        let gate = self.poll_gate.lock().unwrap().take();
        if let Some(release) = gate {
            release.recv_timeout(Duration::from_secs(10)).unwrap();
        }
        let step = self.with_handle(handle, |script| {
            if script.never_ready {
                PollStep::NotReady
            } else {
                script.polls.pop_front().unwrap_or(PollStep::Ready)
            }
        });
        match step {
            PollStep::Ready => Ok(PollStatus::Ready),
            PollStep::NotReady => Ok(PollStatus::NotReady),
            PollStep::Transient => Err(JobClientError::RetriesExhausted {
                operation: "getQueryRun".to_string(),
                attempts: 10,
                last_error: "503 Service Unavailable".to_string(),
            }),
            PollStep::Failed => Err(JobClientError::QueryFailed {
                state: "QUERY_STATE_FAILED".to_string(),
                message: "SQL compilation error".to_string(),
            }),
            PollStep::Stall(stall) => {
                let left = deadline.saturating_duration_since(Instant::now());
                std::thread::sleep(stall.min(left));
                Err(JobClientError::DeadlineExceeded {
                    operation: "getQueryRun".to_string(),
                    attempts: 1,
                })
            }
        }
    }

    fn fetch_page(
        &self,
        handle: &JobHandle,
        page_number: u32,
        page_size: u32,
    ) -> Result<ResultPage, JobClientError> {
        self.record(Call::Fetch(handle.to_string(), page_number, page_size));
        self.with_handle(handle, |script| {
            if script.failing_page == Some(page_number) {
                return Err(JobClientError::RetriesExhausted {
                    operation: "getQueryRunResults".to_string(),
                    attempts: 10,
                    last_error: "timeout".to_string(),
                });
            }
            let index = usize::try_from(page_number - 1).unwrap();
            let rows = script.pages.get(index).cloned().unwrap_or_default();
            let total_pages =
                script.total_pages.unwrap_or_else(|| u32::try_from(script.pages.len()).unwrap());
            Ok(ResultPage {
                rows,
                page_number,
                total_pages,
            })
        })
    }
}

// ============================================================================
// SECTION: Failing Store
// ============================================================================

/// In-memory store with switchable faults.
#[derive(Default)]
pub struct FailingStore {
    /// Backing store.
    pub inner: InMemoryRecordStore,
    /// Fail every upsert.
    pub fail_upsert: AtomicBool,
    /// Fail every maintenance write.
    pub fail_stamp: AtomicBool,
    /// Fail every count.
    pub fail_count: AtomicBool,
    /// Optional shared journal.
    journal: Option<Journal>,
}

impl FailingStore {
    /// Creates a store with no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records writes into `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }
}

impl RecordStore for FailingStore {
    fn get_maintenance_time(&self, chain: ChainId) -> Result<Option<Timestamp>, StoreError> {
        self.inner.get_maintenance_time(chain)
    }

    fn set_maintenance_time(&self, chain: ChainId, at: Timestamp) -> Result<(), StoreError> {
        if self.fail_stamp.load(Ordering::SeqCst) {
            return Err(StoreError::Db("disk I/O error".to_string()));
        }
        note(self.journal.as_ref(), format!("store:stamp:{chain}"));
        self.inner.set_maintenance_time(chain, at)
    }

    fn count_records(&self, chain: ChainId) -> Result<u64, StoreError> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(StoreError::Db("database is locked".to_string()));
        }
        self.inner.count_records(chain)
    }

    fn get_record(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<AddressRecord>, StoreError> {
        self.inner.get_record(chain, address)
    }

    fn upsert_records(&self, records: &[AddressRecord]) -> Result<(), StoreError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(StoreError::Db("constraint failed".to_string()));
        }
        note(self.journal.as_ref(), format!("store:upsert:{}", records.len()));
        self.inner.upsert_records(records)
    }
}

// ============================================================================
// SECTION: Engine Helpers
// ============================================================================

/// Policy with a short timeout and small pages.
pub fn test_policy() -> RefreshPolicy {
    RefreshPolicy {
        poll_timeout: Duration::from_secs(5),
        poll_interval: Duration::ZERO,
        page_size: 2,
    }
}

/// Chain query whose SQL is `sql-{id}`.
pub fn chain(id: u64) -> ChainQuery {
    ChainQuery::new(ChainId::new(id), format!("chain-{id}"), format!("sql-{id}"))
}

/// Builds an engine over the given collaborators.
pub fn engine(
    store: Arc<dyn RecordStore>,
    client: Arc<dyn QueryJobClient>,
    chains: Vec<ChainQuery>,
    policy: RefreshPolicy,
) -> RefreshEngine {
    RefreshEngine::new(RefreshContext {
        store,
        client,
        chains,
        policy,
    })
}

/// Events with `status`.
pub fn with_status(events: &[RefreshEvent], status: RefreshStatus) -> Vec<RefreshEvent> {
    events.iter().filter(|event| event.status == status).cloned().collect()
}
