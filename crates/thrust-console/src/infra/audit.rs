//! Audit trail for operator actions.
//!
//! Every thruster command and test run is appended to a JSONL file together
//! with its outcome, so a bench session can be reconstructed afterwards.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thrust_core::TimeBase;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ConsoleStart,
    ConsoleShutdown,
    ThrusterCommandRequested,
    ThrusterCommandAcknowledged,
    ThrusterCommandFailed,
    TestStarted,
    TestCompleted,
    TestFailed,
    /// Refused locally because a run was already in progress
    TestRejected,
    /// The console exited before the bench answered
    TestAbandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic timestamp in microseconds
    pub timestamp_us: u64,
    /// Wall-clock Unix timestamp in microseconds
    pub unix_us: u64,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
}

/// Thread-safe audit logger that writes to a JSONL file
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Open `path` in append mode, creating parent directories as needed.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn log_event(
        &self,
        timestamp_us: u64,
        unix_us: u64,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            timestamp_us,
            unix_us,
            event_type,
            details,
        })
    }
}

/// Cheap handle used by the console tasks. Recording is a no-op when no
/// audit file was configured; write failures are logged, never propagated.
#[derive(Clone, Default)]
pub struct Audit {
    logger: Option<Arc<AuditLogger>>,
    timebase: TimeBase,
}

impl Audit {
    pub fn new(logger: Option<Arc<AuditLogger>>, timebase: TimeBase) -> Self {
        Self { logger, timebase }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn record(&self, event_type: AuditEventType, details: serde_json::Value) {
        let Some(logger) = &self.logger else {
            return;
        };
        if let Err(e) = logger.log_event(
            self.timebase.now_us(),
            self.timebase.unix_us(),
            event_type,
            details,
        ) {
            warn!(error = %e, event = ?event_type, "Failed to write audit entry");
        }
    }
}
