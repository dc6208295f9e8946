// SPDX-License-Identifier: PMPL-1.0-or-later

//! Event ordering, cancellation and transport failure on streamed requests

use burndevice::audit::{AuditAction, AuditRecorder, MemoryAuditSink};
use burndevice::{
    CancelToken, DestructionCategory, DestructionEngine, DestructionRequest, Event, EventSink,
    EventType, PathMatching, Policy, Severity, TaskStatus, TransportError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tempfile::TempDir;

fn sandbox() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    (dir, root)
}

fn files(root: &Path, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let path = root.join(format!("t{i}.log"));
            fs::write(&path, format!("payload {i}")).unwrap();
            path.to_string_lossy().into_owned()
        })
        .collect()
}

fn engine(root: &Path) -> (DestructionEngine, MemoryAuditSink) {
    let sink = MemoryAuditSink::new();
    let policy = Policy {
        severity_ceiling: Severity::High,
        allowed_prefixes: vec![root.to_string_lossy().into_owned()],
        blocked_prefixes: Vec::new(),
        confirmation_required: true,
        matching: PathMatching::Segment,
    };
    (DestructionEngine::new(policy, AuditRecorder::new(sink.clone())), sink)
}

fn delete(targets: &[String]) -> DestructionRequest {
    DestructionRequest::new(DestructionCategory::FileDeletion, targets.iter().cloned()).confirmed(true)
}

/// Accepts `limit` events, then reports the receiver as gone.
struct FailingSink {
    limit: usize,
    seen: Vec<Event>,
}

impl EventSink for FailingSink {
    fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        if self.seen.len() == self.limit {
            return Err(TransportError::Closed);
        }
        self.seen.push(event.clone());
        Ok(())
    }
}

#[test]
fn two_targets_produce_paired_progress_events() {
    let (_dir, root) = sandbox();
    let targets = files(&root, 2);
    let (engine, _) = engine(&root);

    let events: Vec<Event> = engine
        .stream(&delete(&targets), &CancelToken::new())
        .unwrap()
        .collect();

    let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::Started,
            EventType::Progress,
            EventType::Progress,
            EventType::Progress,
            EventType::Progress,
            EventType::Completed,
        ]
    );
    let progress: Vec<_> = events.iter().map(|e| e.progress).collect();
    assert_eq!(progress, vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]);

    assert_eq!(events[1].target.as_deref(), Some(targets[0].as_str()));
    assert_eq!(events[2].target.as_deref(), Some(targets[0].as_str()));
    assert_eq!(events[3].target.as_deref(), Some(targets[1].as_str()));
    assert!(events[1].message.starts_with("Processing target 1 of 2"));
    assert!(events[2].message.ends_with("(success: true)"));
    assert!(events[5].message.contains("2 targets processed"));
    assert!(targets.iter().all(|t| !Path::new(t).exists()));
}

#[test]
fn per_target_failure_adds_a_warning_before_completion() {
    let (_dir, root) = sandbox();
    let mut targets = files(&root, 1);
    targets.insert(0, root.join("absent.log").to_string_lossy().into_owned());
    let (engine, _) = engine(&root);

    let events: Vec<Event> = engine
        .stream(&delete(&targets), &CancelToken::new())
        .unwrap()
        .collect();

    let tail: Vec<_> = events.iter().rev().take(2).map(|e| e.event_type).collect();
    assert_eq!(tail, vec![EventType::Completed, EventType::Warning]);
    assert!(events[2].message.ends_with("(success: false)"));
    assert_eq!(
        events.iter().filter(|e| e.event_type.is_terminal()).count(),
        1
    );
}

#[test]
fn cancellation_between_targets_keeps_partial_results() {
    let (_dir, root) = sandbox();
    let targets = files(&root, 3);
    let (engine, sink) = engine(&root);
    let caller = CancelToken::new();

    let mut stream = engine.stream(&delete(&targets), &caller).unwrap();
    let mut events = Vec::new();
    // started, before(0), after(0)
    for _ in 0..3 {
        events.push(stream.next().unwrap());
    }
    assert!(engine.registry().cancel(stream.task_id()));
    events.extend(stream.by_ref());

    let last = events.last().unwrap();
    assert_eq!(last.event_type, EventType::Error);
    assert_eq!(last.message, "Destruction cancelled after 1 of 3 targets");
    let outcome = stream.outcome().unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.results.len(), 1);
    assert!(!caller.is_cancelled());

    assert!(!Path::new(&targets[0]).exists());
    assert!(Path::new(&targets[1]).exists());
    assert!(Path::new(&targets[2]).exists());
    drop(stream);
    assert_eq!(engine.registry().count(), 0);
    assert_eq!(sink.records()[0].action, AuditAction::DestructionFailed);
}

#[test]
fn send_failure_stops_further_targets() {
    let (_dir, root) = sandbox();
    let targets = files(&root, 3);
    let (engine, sink) = engine(&root);

    // started, before(0), after(0) delivered; before(1) fails.
    let mut failing = FailingSink {
        limit: 3,
        seen: Vec::new(),
    };
    let err = engine
        .stream(&delete(&targets), &CancelToken::new())
        .unwrap()
        .drive(&mut failing)
        .unwrap_err();

    assert!(matches!(err, TransportError::Closed));
    assert_eq!(failing.seen.len(), 3);
    assert!(!Path::new(&targets[0]).exists());
    assert!(Path::new(&targets[1]).exists());
    assert!(Path::new(&targets[2]).exists());
    assert_eq!(engine.registry().count(), 0);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::DestructionAborted);
    assert!(records[0].reason.as_deref().unwrap().contains("1 of 3"));
}

#[test]
fn rejected_stream_emits_nothing_and_is_audited() {
    let (_dir, root) = sandbox();
    let targets = files(&root, 1);
    let (engine, sink) = engine(&root);

    let rejection = engine
        .stream(&delete(&targets).confirmed(false), &CancelToken::new())
        .err()
        .unwrap();

    assert!(rejection.to_string().contains("confirmation required"));
    assert!(Path::new(&targets[0]).exists());
    assert_eq!(sink.records()[0].action, AuditAction::DestructionRejected);
}

#[test]
fn events_cross_threads_through_a_channel() {
    let (_dir, root) = sandbox();
    let targets = files(&root, 4);
    let (engine, _) = engine(&root);
    let stream = engine.stream(&delete(&targets), &CancelToken::new()).unwrap();
    let task_id = stream.task_id().clone();

    let (tx, rx) = mpsc::channel();
    let producer = thread::spawn(move || {
        let mut tx = tx;
        stream.drive(&mut tx)
    });
    let received: Vec<Event> = rx.iter().collect();
    let outcome = producer.join().unwrap().unwrap();

    assert_eq!(received.len(), 1 + 2 * 4 + 1);
    assert!(received.iter().all(|e| e.task_id == task_id));
    assert_eq!(received.last().unwrap().event_type, EventType::Completed);
    assert_eq!(outcome.results.len(), 4);
    assert_eq!(engine.registry().count(), 0);
}
