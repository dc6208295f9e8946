// SPDX-License-Identifier: PMPL-1.0-or-later

//! Task records and cancellation.

use crate::types::{DestructionCategory, DestructionRequest, DestructionResult, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Unique task identifier. Backed by a random v4 UUID, so never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(format!("task_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

/// Cooperative cancellation flag.
///
/// Clones share one flag. A child observes its own flag and every ancestor's,
/// so cancelling a caller's token stops all tasks derived from it while a
/// task-level cancel leaves the caller untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
    }
}

/// One in-flight execution of a validated request.
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub category: DestructionCategory,
    pub targets: Vec<String>,
    pub severity: Severity,
    pub scenario_reference: Option<String>,
    pub status: TaskStatus,
    pub results: Vec<DestructionResult>,
    pub started_at: DateTime<Utc>,
    pub cancel: CancelToken,
}

impl Task {
    pub fn new(request: &DestructionRequest, caller: &CancelToken) -> Self {
        Self {
            id: TaskId::new(),
            category: request.category,
            targets: request.targets.clone(),
            severity: request.severity,
            scenario_reference: request.scenario_reference.clone(),
            status: TaskStatus::Running,
            results: Vec::new(),
            started_at: Utc::now(),
            cancel: caller.child(),
        }
    }
}
