//! Audit trail for registration attempts.
//!
//! Sinks are passed into the orchestrator explicitly. Writing an audit record
//! never fails the attempt it describes; sink errors are logged and dropped.

use crate::error::{IndexScopeError, Result};
use crate::models::RegistrationAttempt;
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Receives every registration attempt once it is complete.
pub trait AuditSink: Send + Sync {
    fn record(&self, attempt: &RegistrationAttempt);
}

/// Emits one structured `tracing` event per attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, attempt: &RegistrationAttempt) {
        info!(
            attempt_id = %attempt.id,
            mode = ?attempt.mode,
            outcome = ?attempt.outcome,
            user = %attempt.user,
            elevated = attempt.is_elevated,
            binary = %attempt.binary_path,
            exit_code = ?attempt.exit_code,
            duration_ms = attempt.duration_ms,
            post_validation = ?attempt.post_validation,
            "Registration attempt finished"
        );
    }
}

/// Appends one JSON object per line to a file, under an exclusive lock.
#[derive(Debug, Clone)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
}

impl JsonLinesAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, attempt: &RegistrationAttempt) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| IndexScopeError::io_with_path(e, parent))?;
            }
        }

        let mut line = serde_json::to_string(attempt)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| IndexScopeError::io_with_path(e, &self.path))?;
        file.lock_exclusive()
            .map_err(|e| IndexScopeError::io_with_path(e, &self.path))?;
        let written = file.write_all(line.as_bytes());
        let _ = file.unlock();
        written.map_err(|e| IndexScopeError::io_with_path(e, &self.path))
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn record(&self, attempt: &RegistrationAttempt) {
        if let Err(e) = self.append(attempt) {
            warn!("Failed to write audit record to {}: {}", self.path.display(), e);
        }
    }
}

/// Forwards every record to each inner sink.
#[derive(Clone, Default)]
pub struct FanOutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanOutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanOutAuditSink {
    fn record(&self, attempt: &RegistrationAttempt) {
        for sink in &self.sinks {
            sink.record(attempt);
        }
    }
}

/// Keeps attempts in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    attempts: Mutex<Vec<RegistrationAttempt>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<RegistrationAttempt> {
        self.attempts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, attempt: &RegistrationAttempt) {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(attempt.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RegistrationMode, RegistrationOutcome, ValidationState};
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn attempt(outcome: RegistrationOutcome) -> RegistrationAttempt {
        RegistrationAttempt {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            mode: RegistrationMode::Automatic,
            user: "tester".into(),
            is_elevated: true,
            binary_path: r"C:\Windows\System32\SearchAPI.dll".into(),
            method: "regsvr32".into(),
            outcome,
            exit_code: Some(0),
            error_message: None,
            duration_ms: 12,
            post_validation: ValidationState::Valid,
        }
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("audit.jsonl");
        let sink = JsonLinesAuditSink::new(&path);

        sink.record(&attempt(RegistrationOutcome::Success));
        sink.record(&attempt(RegistrationOutcome::Failed));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: RegistrationAttempt = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.outcome, RegistrationOutcome::Failed);
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let first = Arc::new(MemoryAuditSink::new());
        let second = Arc::new(MemoryAuditSink::new());
        let sink = FanOutAuditSink::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(TracingAuditSink));

        sink.record(&attempt(RegistrationOutcome::Timeout));

        assert_eq!(first.attempts().len(), 1);
        assert_eq!(second.attempts()[0].outcome, RegistrationOutcome::Timeout);
    }
}
