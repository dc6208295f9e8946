// SPDX-License-Identifier: PMPL-1.0-or-later

//! Core type definitions for burndevice
//!
//! Requests, per-target results and streamed events. Everything here is
//! plain data; behaviour lives in `policy`, `strategy` and `engine`.

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Destruction categories understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum DestructionCategory {
    FileDeletion,
    RegistryCorruption,
    ServiceTermination,
    MemoryExhaustion,
    DiskFill,
    NetworkDisruption,
    BootCorruption,
    KernelPanic,
}

impl DestructionCategory {
    pub fn all() -> Vec<Self> {
        vec![
            DestructionCategory::FileDeletion,
            DestructionCategory::RegistryCorruption,
            DestructionCategory::ServiceTermination,
            DestructionCategory::MemoryExhaustion,
            DestructionCategory::DiskFill,
            DestructionCategory::NetworkDisruption,
            DestructionCategory::BootCorruption,
            DestructionCategory::KernelPanic,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DestructionCategory::FileDeletion => "FILE_DELETION",
            DestructionCategory::RegistryCorruption => "REGISTRY_CORRUPTION",
            DestructionCategory::ServiceTermination => "SERVICE_TERMINATION",
            DestructionCategory::MemoryExhaustion => "MEMORY_EXHAUSTION",
            DestructionCategory::DiskFill => "DISK_FILL",
            DestructionCategory::NetworkDisruption => "NETWORK_DISRUPTION",
            DestructionCategory::BootCorruption => "BOOT_CORRUPTION",
            DestructionCategory::KernelPanic => "KERNEL_PANIC",
        }
    }
}

impl fmt::Display for DestructionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestructionCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Accept FILE_DELETION, file_deletion and file-deletion alike.
        let key = value.trim().to_ascii_uppercase().replace('-', "_");
        DestructionCategory::all()
            .into_iter()
            .find(|category| category.as_str() == key)
            .ok_or_else(|| format!("unknown destruction category: {}", value))
    }
}

impl TryFrom<String> for DestructionCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ordered risk tier. The derived ordering follows the numeric rank.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Severity {
    #[default]
    Unspecified,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Unspecified => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn from_rank(rank: u8) -> Self {
        match rank {
            0 => Severity::Unspecified,
            1 => Severity::Low,
            2 => Severity::Medium,
            3 => Severity::High,
            _ => Severity::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Unspecified => write!(f, "UNSPECIFIED"),
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNSPECIFIED" => Ok(Severity::Unspecified),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", value)),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Immutable request as submitted by an operator or derived from a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestructionRequest {
    pub category: DestructionCategory,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_reference: Option<String>,
}

impl DestructionRequest {
    pub fn new<I, S>(category: DestructionCategory, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category,
            targets: targets.into_iter().map(Into::into).collect(),
            severity: Severity::Low,
            confirmed: false,
            scenario_reference: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }

    pub fn with_scenario(mut self, reference: impl Into<String>) -> Self {
        self.scenario_reference = Some(reference.into());
        self
    }
}

/// Per-target counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub files_deleted: u64,
    pub bytes_destroyed: u64,
    /// Wall-clock time for the target, filled in by the engine.
    pub execution_time_seconds: f64,
}

/// Outcome for one target (or one aggregate unit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestructionResult {
    pub target: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub metrics: Metrics,
}

impl DestructionResult {
    pub fn succeeded(target: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            target: target.into(),
            success: true,
            error_message: None,
            metrics,
        }
    }

    pub fn failed(target: impl Into<String>, message: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            target: target.into(),
            success: false,
            error_message: Some(message.into()),
            metrics,
        }
    }
}

/// Synchronous reply to `DestructionEngine::execute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestructionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub results: Vec<DestructionResult>,
    pub timestamp: DateTime<Utc>,
}

impl DestructionResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            task_id: None,
            results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed_targets(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Started,
    Progress,
    Completed,
    Error,
    Warning,
}

impl EventType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::Completed | EventType::Error)
    }
}

/// Streamed lifecycle event. Produced, sent and dropped; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub progress: f64,
    pub message: String,
}

impl Event {
    pub fn new(
        task_id: TaskId,
        event_type: EventType,
        target: Option<String>,
        progress: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            task_id,
            target,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }
}
