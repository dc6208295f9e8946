// SPDX-License-Identifier: PMPL-1.0-or-later

//! Concurrency-safe table of in-flight tasks.
//!
//! Entries are added through `TaskRegistry::register`, which hands back a
//! `Registration` guard. Dropping the guard removes the entry, so a task is
//! unregistered exactly once on every exit path: normal completion, early
//! return, a dropped stream or a panic unwinding through the engine.

use crate::task::{CancelToken, Task, TaskId};
use crate::types::{DestructionCategory, Severity};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct TaskEntry {
    category: DestructionCategory,
    severity: Severity,
    target_count: usize,
    started_at: DateTime<Utc>,
    cancel: CancelToken,
}

/// Point-in-time view of a registered task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub category: DestructionCategory,
    pub severity: Severity,
    pub target_count: usize,
    pub started_at: DateTime<Utc>,
    pub cancel_requested: bool,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, task: &Task) -> Registration {
        let entry = TaskEntry {
            category: task.category,
            severity: task.severity,
            target_count: task.targets.len(),
            started_at: task.started_at,
            cancel: task.cancel.clone(),
        };
        let previous = self.tasks.lock().insert(task.id.clone(), entry);
        debug_assert!(previous.is_none(), "task id {} registered twice", task.id);
        tracing::debug!(task_id = %task.id, "task registered");

        Registration {
            registry: Arc::clone(self),
            id: task.id.clone(),
            active: true,
        }
    }

    /// Remove `id`; returns false when it was not registered.
    pub fn unregister(&self, id: &TaskId) -> bool {
        let removed = self.tasks.lock().remove(id).is_some();
        if removed {
            tracing::debug!(task_id = %id, "task unregistered");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn lookup(&self, id: &TaskId) -> Option<TaskSnapshot> {
        self.tasks
            .lock()
            .get(id)
            .map(|entry| snapshot(id, entry))
    }

    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let tasks = self.tasks.lock();
        let mut all: Vec<_> = tasks.iter().map(|(id, entry)| snapshot(id, entry)).collect();
        all.sort_by_key(|s| s.started_at);
        all
    }

    /// Ask a running task to stop before its next target.
    pub fn cancel(&self, id: &TaskId) -> bool {
        match self.tasks.lock().get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

fn snapshot(id: &TaskId, entry: &TaskEntry) -> TaskSnapshot {
    TaskSnapshot {
        id: id.clone(),
        category: entry.category,
        severity: entry.severity,
        target_count: entry.target_count,
        started_at: entry.started_at,
        cancel_requested: entry.cancel.is_cancelled(),
    }
}

/// Guard that keeps a task registered for as long as it lives.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<TaskRegistry>,
    id: TaskId,
    active: bool,
}

impl Registration {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Unregister now instead of at drop.
    pub fn release(mut self) {
        self.unregister_once();
    }

    fn unregister_once(&mut self) {
        if self.active {
            self.active = false;
            self.registry.unregister(&self.id);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.unregister_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DestructionRequest;
    use std::thread;

    fn task() -> Task {
        let request = DestructionRequest::new(DestructionCategory::DiskFill, ["/tmp/a"]);
        Task::new(&request, &CancelToken::new())
    }

    #[test]
    fn guard_unregisters_on_drop() {
        let registry = TaskRegistry::new();
        let task = task();
        {
            let guard = registry.register(&task);
            assert_eq!(registry.count(), 1);
            assert_eq!(guard.id(), &task.id);
            assert_eq!(registry.lookup(&task.id).unwrap().target_count, 1);
            assert_eq!(registry.snapshot()[0].id, task.id);
        }
        assert_eq!(registry.count(), 0);
        assert!(registry.lookup(&task.id).is_none());
    }

    #[test]
    fn release_is_idempotent_with_drop() {
        let registry = TaskRegistry::new();
        let task = task();
        let guard = registry.register(&task);
        guard.release();
        assert_eq!(registry.count(), 0);
        assert!(!registry.unregister(&task.id));
    }

    #[test]
    fn cancel_reaches_the_task_token() {
        let registry = TaskRegistry::new();
        let task = task();
        let _guard = registry.register(&task);
        assert!(registry.cancel(&task.id));
        assert!(task.cancel.is_cancelled());
        assert!(registry.lookup(&task.id).unwrap().cancel_requested);
        assert!(!registry.cancel(&TaskId::new()));
    }

    #[test]
    fn guard_unregisters_during_panic() {
        let registry = TaskRegistry::new();
        let inner = Arc::clone(&registry);
        let outcome = thread::spawn(move || {
            let task = task();
            let _guard = inner.register(&task);
            panic!("strategy blew up");
        })
        .join();
        assert!(outcome.is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn concurrent_registration_leaves_no_entries() {
        let registry = TaskRegistry::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let task = task();
                        let _guard = registry.register(&task);
                        assert!(registry.count() >= 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.count(), 0);
    }
}
