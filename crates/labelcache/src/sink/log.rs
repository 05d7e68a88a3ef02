// crates/labelcache/src/sink/log.rs
// ============================================================================
// Module: JSON Lines Progress Sink
// Description: Structured progress log writer.
// Purpose: Emit one JSON object per progress event.
// Dependencies: labelcache-core, serde_json, std
// ============================================================================

//! ## Overview
//! [`LogSink`] writes each event as a single JSON line:
//!
//! ```text
//! {"event":"refresh_progress","timestamp_ms":1700000000000,"level":"info","status":"updating","chain_id":1,"message":"Updating chain id: 1"}
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use labelcache_core::RefreshEvent;
use serde_json::json;

use crate::sink::ProgressSink;

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// JSON-lines progress sink.
pub struct LogSink<W: Write + Send> {
    /// Output writer for log records.
    writer: Mutex<W>,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a log sink over `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Writes one record at `level`.
    fn write(&self, level: &str, event: &RefreshEvent) {
        let record = json!({
            "event": "refresh_progress",
            "timestamp_ms": now_millis(),
            "level": level,
            "status": event.status,
            "chain_id": event.chain,
            "message": event.message,
        });
        if let Ok(mut guard) = self.writer.lock()
            && serde_json::to_writer(&mut *guard, &record).is_ok()
        {
            let _ = guard.write_all(b"\n");
            let _ = guard.flush();
        }
    }
}

impl<W: Write + Send> ProgressSink for LogSink<W> {
    fn info(&self, event: &RefreshEvent) {
        self.write("info", event);
    }

    fn success(&self, event: &RefreshEvent) {
        self.write("success", event);
    }

    fn warning(&self, event: &RefreshEvent) {
        self.write("warning", event);
    }

    fn error(&self, event: &RefreshEvent) {
        self.write("error", event);
    }
}

/// Milliseconds since the unix epoch, saturating.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
