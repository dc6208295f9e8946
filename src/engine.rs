// SPDX-License-Identifier: PMPL-1.0-or-later

//! Destruction engine: validation, task lifecycle and strategy dispatch.
//!
//! A request moves through `validate → register → run → audit → unregister`.
//! Rejected requests never create a task. Accepted ones are registered for
//! exactly the lifetime of their `TaskRun`, whatever way that run ends.

use crate::audit::{
    AuditAction, AuditEntry, AuditRecorder, JsonlAuditSink, TracingAuditSink,
};
use crate::config::Config;
use crate::error::{Rejection, StrategyError};
use crate::policy::{self, Policy};
use crate::registry::{Registration, TaskRegistry};
use crate::strategy::{self, run_unit, Strategy, TargetScope};
use crate::stream::DestructionStream;
use crate::task::{CancelToken, Task, TaskId, TaskStatus};
use crate::types::{DestructionRequest, DestructionResponse, DestructionResult};
use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Why a task ended `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    Strategy(StrategyError),
    Cancelled { processed: usize, total: usize },
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Strategy(err) => write!(f, "Destruction failed: {}", err),
            TaskFailure::Cancelled { processed, total } => write!(
                f,
                "Destruction cancelled after {} of {} targets",
                processed, total
            ),
        }
    }
}

/// Final state of a task once it leaves the registry.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub results: Vec<DestructionResult>,
    pub failure: Option<TaskFailure>,
}

impl TaskOutcome {
    pub fn failed_targets(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn message(&self) -> String {
        if let Some(failure) = &self.failure {
            return failure.to_string();
        }
        let failed = self.failed_targets();
        if failed == 0 {
            format!(
                "Destruction completed successfully. {} targets processed.",
                self.results.len()
            )
        } else {
            format!(
                "Destruction completed with {} of {} targets failed.",
                failed,
                self.results.len()
            )
        }
    }

    pub fn to_response(&self) -> DestructionResponse {
        DestructionResponse {
            success: self.status == TaskStatus::Completed,
            message: self.message(),
            task_id: Some(self.task_id.clone()),
            results: self.results.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DestructionEngine {
    policy: Arc<Policy>,
    registry: Arc<TaskRegistry>,
    audit: Arc<AuditRecorder>,
}

impl DestructionEngine {
    pub fn new(policy: Policy, audit: AuditRecorder) -> Self {
        Self {
            policy: Arc::new(policy),
            registry: TaskRegistry::new(),
            audit: Arc::new(audit),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let security = &config.security;
        let audit = if !security.audit_log {
            AuditRecorder::disabled()
        } else if let Some(path) = &security.audit_path {
            let sink = JsonlAuditSink::open(path)
                .with_context(|| format!("opening audit log {}", path.display()))?;
            AuditRecorder::new(sink)
        } else {
            AuditRecorder::new(TracingAuditSink)
        };
        Ok(Self::new(security.policy(), audit))
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Run the validator only. Nothing is registered or audited.
    pub fn check(&self, request: &DestructionRequest) -> Result<(), Rejection> {
        policy::validate(request, &self.policy)
    }

    /// Execute a request to completion and report every target's result.
    pub fn execute(
        &self,
        request: &DestructionRequest,
        cancel: &CancelToken,
    ) -> DestructionResponse {
        let mut run = match TaskRun::start(self, request, cancel) {
            Ok(run) => run,
            Err(rejection) => {
                return DestructionResponse::rejected(format!("Validation failed: {}", rejection))
            }
        };

        while run.has_pending() {
            if run.cancel_requested() {
                run.mark_cancelled();
                break;
            }
            run.process_next();
        }

        run.finish().to_response()
    }

    /// Start a request whose progress is reported as a sequence of events.
    pub fn stream(
        &self,
        request: &DestructionRequest,
        cancel: &CancelToken,
    ) -> Result<DestructionStream, Rejection> {
        TaskRun::start(self, request, cancel).map(DestructionStream::new)
    }

    /// Execute independent requests concurrently; responses keep input order.
    pub fn execute_batch(
        &self,
        requests: &[DestructionRequest],
        cancel: &CancelToken,
    ) -> Vec<DestructionResponse> {
        requests
            .par_iter()
            .map(|request| self.execute(request, cancel))
            .collect()
    }
}

/// One accepted request from registration to unregistration.
pub(crate) struct TaskRun {
    task: Task,
    strategy: Box<dyn Strategy>,
    units: Vec<String>,
    cursor: usize,
    failure: Option<TaskFailure>,
    outcome: Option<TaskOutcome>,
    audit: Arc<AuditRecorder>,
    registration: Option<Registration>,
}

impl TaskRun {
    fn start(
        engine: &DestructionEngine,
        request: &DestructionRequest,
        cancel: &CancelToken,
    ) -> Result<Self, Rejection> {
        tracing::warn!(
            category = %request.category,
            targets = ?request.targets,
            severity = %request.severity,
            confirmed = request.confirmed,
            "received destruction request"
        );

        if let Err(rejection) = policy::validate(request, &engine.policy) {
            tracing::warn!(reason = %rejection, "destruction request rejected");
            engine.audit.record(AuditEntry {
                action: AuditAction::DestructionRejected,
                task_id: None,
                scenario_reference: request.scenario_reference.as_deref(),
                category: request.category,
                targets: &request.targets,
                severity: request.severity,
                success: false,
                reason: Some(rejection.to_string()),
            });
            return Err(rejection);
        }

        let task = Task::new(request, cancel);
        let registration = engine.registry.register(&task);
        let strategy = strategy::select(task.category, &engine.policy);
        let units = strategy.units(&task.targets);
        let failure = strategy.prepare(&task.targets).err().map(TaskFailure::Strategy);

        tracing::info!(task_id = %task.id, units = units.len(), "destruction task started");

        Ok(Self {
            task,
            strategy,
            units,
            cursor: 0,
            failure,
            outcome: None,
            audit: Arc::clone(&engine.audit),
            registration: Some(registration),
        })
    }

    pub(crate) fn task_id(&self) -> &TaskId {
        &self.task.id
    }

    pub(crate) fn outcome(&self) -> Option<&TaskOutcome> {
        self.outcome.as_ref()
    }

    pub(crate) fn total(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn processed(&self) -> usize {
        self.cursor
    }

    pub(crate) fn reports_progress(&self) -> bool {
        self.strategy.scope() == TargetScope::PerTarget
    }

    /// More units to run and nothing has failed the task.
    pub(crate) fn has_pending(&self) -> bool {
        self.failure.is_none() && self.cursor < self.units.len()
    }

    pub(crate) fn next_unit(&self) -> Option<&str> {
        self.units.get(self.cursor).map(String::as_str)
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.task.cancel.is_cancelled()
    }

    pub(crate) fn mark_cancelled(&mut self) {
        tracing::warn!(
            task_id = %self.task.id,
            processed = self.cursor,
            total = self.units.len(),
            "destruction task cancelled"
        );
        self.failure = Some(TaskFailure::Cancelled {
            processed: self.cursor,
            total: self.units.len(),
        });
    }

    /// Run the next unit. Returns its result, or `None` when the strategy
    /// faulted and the task is now failed.
    pub(crate) fn process_next(&mut self) -> Option<&DestructionResult> {
        let unit = self.units.get(self.cursor)?.clone();
        self.cursor += 1;
        match run_unit(self.strategy.as_ref(), &unit) {
            Ok(result) => {
                self.task.results.push(result);
                self.task.results.last()
            }
            Err(err) => {
                tracing::error!(task_id = %self.task.id, error = %err, "destruction task failed");
                self.failure = Some(TaskFailure::Strategy(err));
                None
            }
        }
    }

    /// Settle status, write the audit record and leave the registry.
    /// Calling it again returns the same outcome.
    pub(crate) fn finish(&mut self) -> &TaskOutcome {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.settle(),
        };
        self.outcome.insert(outcome)
    }

    fn settle(&mut self) -> TaskOutcome {
        let status = if self.failure.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        self.task.status = status;
        let outcome = TaskOutcome {
            task_id: self.task.id.clone(),
            status,
            results: std::mem::take(&mut self.task.results),
            failure: self.failure.clone(),
        };

        let (action, reason) = match status {
            TaskStatus::Completed if outcome.failed_targets() == 0 => {
                (AuditAction::DestructionExecuted, None)
            }
            TaskStatus::Completed => (AuditAction::DestructionExecuted, Some(outcome.message())),
            _ => (AuditAction::DestructionFailed, Some(outcome.message())),
        };
        self.record(action, status == TaskStatus::Completed, reason);

        if let Some(registration) = self.registration.take() {
            registration.release();
        }
        tracing::info!(
            task_id = %self.task.id,
            status = ?status,
            results = outcome.results.len(),
            failed = outcome.failed_targets(),
            "destruction task finished"
        );
        outcome
    }

    fn record(&self, action: AuditAction, success: bool, reason: Option<String>) {
        self.audit.record(AuditEntry {
            action,
            task_id: Some(&self.task.id),
            scenario_reference: self.task.scenario_reference.as_deref(),
            category: self.task.category,
            targets: &self.task.targets,
            severity: self.task.severity,
            success,
            reason,
        });
    }
}

impl Drop for TaskRun {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            tracing::warn!(
                task_id = %self.task.id,
                processed = self.cursor,
                total = self.units.len(),
                "destruction task abandoned before completion"
            );
            self.record(
                AuditAction::DestructionAborted,
                false,
                Some(format!(
                    "stream closed after {} of {} targets",
                    self.cursor,
                    self.units.len()
                )),
            );
        }
        // `registration` drops after this, removing the registry entry.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::types::{DestructionCategory, Severity};

    fn engine() -> (DestructionEngine, MemoryAuditSink) {
        let sink = MemoryAuditSink::new();
        let policy = Policy {
            severity_ceiling: Severity::High,
            allowed_prefixes: vec!["/srv/test".into()],
            blocked_prefixes: vec!["/etc".into()],
            confirmation_required: true,
            ..Policy::default()
        };
        (DestructionEngine::new(policy, AuditRecorder::new(sink.clone())), sink)
    }

    #[test]
    fn rejection_creates_no_task() {
        let (engine, sink) = engine();
        let request = DestructionRequest::new(DestructionCategory::DiskFill, ["/srv/test/a"]);
        let response = engine.execute(&request, &CancelToken::new());

        assert!(!response.success);
        assert!(response.task_id.is_none());
        assert!(response.message.contains("confirmation required"));
        assert_eq!(engine.registry().count(), 0);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::DestructionRejected);
    }

    #[test]
    fn simulated_request_completes_with_one_aggregate_result() {
        let (engine, sink) = engine();
        let request = DestructionRequest::new(
            DestructionCategory::NetworkDisruption,
            ["/srv/test/eth0", "/srv/test/eth1"],
        )
        .confirmed(true);
        let response = engine.execute(&request, &CancelToken::new());

        assert!(response.success, "{}", response.message);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].target, "/srv/test/eth0,/srv/test/eth1");
        assert_eq!(engine.registry().count(), 0);
        assert_eq!(sink.records()[0].action, AuditAction::DestructionExecuted);
    }

    #[test]
    fn cancelled_caller_fails_the_task_without_results() {
        let (engine, sink) = engine();
        let cancel = CancelToken::new();
        cancel.cancel();
        let request =
            DestructionRequest::new(DestructionCategory::KernelPanic, ["/srv/test/a"]).confirmed(true);
        let response = engine.execute(&request, &cancel);

        assert!(!response.success);
        assert!(response.results.is_empty());
        assert_eq!(response.message, "Destruction cancelled after 0 of 1 targets");
        assert_eq!(sink.records()[0].action, AuditAction::DestructionFailed);
        assert_eq!(engine.registry().count(), 0);
    }

    #[test]
    fn finish_is_idempotent() {
        let (engine, sink) = engine();
        let request =
            DestructionRequest::new(DestructionCategory::DiskFill, ["/srv/test/a"]).confirmed(true);
        let mut run = TaskRun::start(&engine, &request, &CancelToken::new()).unwrap();
        while run.has_pending() {
            run.process_next();
        }
        let first = run.finish().clone();
        let second = run.finish().clone();
        assert_eq!(first.task_id, second.task_id);
        assert_eq!(first.results, second.results);
        drop(run);
        assert_eq!(sink.records().len(), 1);
    }
}
