// SPDX-License-Identifier: PMPL-1.0-or-later

//! Audit trail for policy decisions and task outcomes.

use crate::task::TaskId;
use crate::types::{DestructionCategory, Severity};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DestructionRejected,
    DestructionExecuted,
    DestructionFailed,
    DestructionAborted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DestructionRejected => "DESTRUCTION_REJECTED",
            AuditAction::DestructionExecuted => "DESTRUCTION_EXECUTED",
            AuditAction::DestructionFailed => "DESTRUCTION_FAILED",
            AuditAction::DestructionAborted => "DESTRUCTION_ABORTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    pub host_identifier: String,
    pub actor_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_reference: Option<String>,
    pub category: DestructionCategory,
    pub targets: Vec<String>,
    pub severity: Severity,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What happened, before host and actor are stamped on.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub action: AuditAction,
    pub task_id: Option<&'a TaskId>,
    pub scenario_reference: Option<&'a str>,
    pub category: DestructionCategory,
    pub targets: &'a [String],
    pub severity: Severity,
    pub success: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log io failure at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("audit record could not be encoded")]
    Encode(#[from] serde_json::Error),
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Emits each record as a structured tracing event.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        tracing::info!(
            target: "burndevice::audit",
            action = record.action.as_str(),
            timestamp = %record.timestamp.to_rfc3339(),
            host = %record.host_identifier,
            user = %record.actor_identifier,
            task_id = record.task_id.as_ref().map(TaskId::as_str),
            scenario = record.scenario_reference.as_deref(),
            category = %record.category,
            targets = ?record.targets,
            severity = %record.severity,
            success = record.success,
            reason = record.reason.as_deref(),
            "audit log entry"
        );
        Ok(())
    }
}

/// Appends one JSON object per line.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let io_err = |source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)
            .and_then(|_| file.flush())
            .map_err(|source| AuditError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Keeps records in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Stamps host and actor onto entries and forwards them to a sink.
pub struct AuditRecorder {
    sink: Option<Box<dyn AuditSink>>,
    host: String,
    actor: String,
}

impl AuditRecorder {
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            host: host_identifier(),
            actor: actor_identifier(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: None,
            host: host_identifier(),
            actor: actor_identifier(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Sink failures are logged and swallowed; auditing never changes an outcome.
    pub fn record(&self, entry: AuditEntry<'_>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let record = AuditRecord {
            action: entry.action,
            timestamp: Utc::now(),
            host_identifier: self.host.clone(),
            actor_identifier: self.actor.clone(),
            task_id: entry.task_id.cloned(),
            scenario_reference: entry.scenario_reference.map(str::to_string),
            category: entry.category,
            targets: entry.targets.to_vec(),
            severity: entry.severity,
            success: entry.success,
            reason: entry.reason,
        };
        if let Err(err) = sink.record(&record) {
            tracing::error!(error = %err, action = record.action.as_str(), "failed to write audit record");
        }
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("enabled", &self.is_enabled())
            .field("host", &self.host)
            .field("actor", &self.actor)
            .finish()
    }
}

fn host_identifier() -> String {
    env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn actor_identifier() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(targets: &[String]) -> AuditEntry<'_> {
        AuditEntry {
            action: AuditAction::DestructionRejected,
            task_id: None,
            scenario_reference: Some("scn-1"),
            category: DestructionCategory::FileDeletion,
            targets,
            severity: Severity::Low,
            success: false,
            reason: Some("confirmation required".into()),
        }
    }

    #[test]
    fn memory_sink_collects_stamped_records() {
        let sink = MemoryAuditSink::new();
        let recorder = AuditRecorder::new(sink.clone());
        let targets = vec!["/tmp/a".to_string()];
        recorder.record(entry(&targets));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::DestructionRejected);
        assert!(!records[0].host_identifier.is_empty());
        assert!(!records[0].actor_identifier.is_empty());
        assert_eq!(records[0].scenario_reference.as_deref(), Some("scn-1"));
    }

    #[test]
    fn disabled_recorder_is_silent() {
        let recorder = AuditRecorder::disabled();
        assert!(!recorder.is_enabled());
        recorder.record(entry(&[]));
    }

    #[test]
    fn jsonl_sink_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit/burndevice.jsonl");
        let recorder = AuditRecorder::new(JsonlAuditSink::open(&path).unwrap());
        let targets = vec!["/tmp/a".to_string()];
        recorder.record(entry(&targets));
        recorder.record(entry(&targets));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.action, AuditAction::DestructionRejected);
        assert_eq!(parsed.targets, targets);
        assert!(lines[0].contains("\"DESTRUCTION_REJECTED\""));
    }
}
