// SPDX-License-Identifier: PMPL-1.0-or-later

//! Streaming execution.
//!
//! `DestructionStream` is a lazy iterator: each target is processed inside the
//! `next()` call that yields its completion event, so a consumer that stops
//! pulling stops the work. Every stream yields `started` first and exactly one
//! terminal event (`completed` or `error`) last. Dropping a stream early
//! records an aborted task and unregisters it.

use crate::engine::{TaskOutcome, TaskRun};
use crate::error::TransportError;
use crate::task::{TaskId, TaskStatus};
use crate::types::{Event, EventType};
use std::io::Write;
use std::sync::mpsc;

/// Destination for stream events.
pub trait EventSink {
    fn send(&mut self, event: &Event) -> Result<(), TransportError>;
}

impl EventSink for mpsc::Sender<Event> {
    fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        mpsc::Sender::send(self, event.clone()).map_err(|_| TransportError::Closed)
    }
}

impl EventSink for mpsc::SyncSender<Event> {
    fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        mpsc::SyncSender::send(self, event.clone()).map_err(|_| TransportError::Closed)
    }
}

impl EventSink for Vec<Event> {
    fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        self.push(event.clone());
        Ok(())
    }
}

/// Writes one JSON object per line and flushes after each event.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Before,
    After,
    Finish,
    Terminal,
    Done,
}

pub struct DestructionStream {
    run: TaskRun,
    phase: Phase,
}

impl DestructionStream {
    pub(crate) fn new(run: TaskRun) -> Self {
        Self {
            run,
            phase: Phase::Start,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        self.run.task_id()
    }

    /// Outcome of the task, available once the terminal event was produced.
    pub fn outcome(&self) -> Option<&TaskOutcome> {
        match self.phase {
            Phase::Terminal | Phase::Done => self.run.outcome(),
            _ => None,
        }
    }

    /// Push every event into `sink`. The first delivery failure aborts the
    /// task: no further targets are processed.
    pub fn drive<S: EventSink + ?Sized>(
        mut self,
        sink: &mut S,
    ) -> Result<TaskOutcome, TransportError> {
        for event in self.by_ref() {
            if let Err(err) = sink.send(&event) {
                tracing::warn!(task_id = %event.task_id, error = %err, "event delivery failed");
                return Err(err);
            }
        }
        Ok(self.run.finish().clone())
    }

    fn event(
        &self,
        event_type: EventType,
        target: Option<String>,
        progress: f64,
        message: impl Into<String>,
    ) -> Event {
        Event::new(self.run.task_id().clone(), event_type, target, progress, message)
    }

    fn fraction(&self, done: usize) -> f64 {
        match self.run.total() {
            0 => 0.0,
            total => done as f64 / total as f64,
        }
    }
}

impl Iterator for DestructionStream {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            match self.phase {
                Phase::Start => {
                    self.phase = Phase::Before;
                    return Some(self.event(
                        EventType::Started,
                        None,
                        0.0,
                        "Destruction task started",
                    ));
                }
                Phase::Before => {
                    if !self.run.has_pending() {
                        self.phase = Phase::Finish;
                        continue;
                    }
                    if self.run.cancel_requested() {
                        self.run.mark_cancelled();
                        self.phase = Phase::Finish;
                        continue;
                    }
                    if !self.run.reports_progress() {
                        self.run.process_next();
                        continue;
                    }
                    let index = self.run.processed();
                    let target = self.run.next_unit().unwrap_or_default().to_string();
                    self.phase = Phase::After;
                    return Some(self.event(
                        EventType::Progress,
                        Some(target.clone()),
                        self.fraction(index),
                        format!(
                            "Processing target {} of {}: {}",
                            index + 1,
                            self.run.total(),
                            target
                        ),
                    ));
                }
                Phase::After => {
                    let completed = self
                        .run
                        .process_next()
                        .map(|result| (result.target.clone(), result.success));
                    match completed {
                        Some((target, success)) => {
                            self.phase = Phase::Before;
                            return Some(self.event(
                                EventType::Progress,
                                Some(target.clone()),
                                self.fraction(self.run.processed()),
                                format!("Target completed: {} (success: {})", target, success),
                            ));
                        }
                        None => {
                            self.phase = Phase::Finish;
                            continue;
                        }
                    }
                }
                Phase::Finish => {
                    self.phase = Phase::Terminal;
                    let outcome = self.run.finish();
                    let failed = outcome.failed_targets();
                    if outcome.status == TaskStatus::Completed && failed > 0 {
                        let total = outcome.results.len();
                        return Some(self.event(
                            EventType::Warning,
                            None,
                            1.0,
                            format!("{} of {} targets failed", failed, total),
                        ));
                    }
                    continue;
                }
                Phase::Terminal => {
                    self.phase = Phase::Done;
                    let (event_type, message) = match self.run.outcome() {
                        Some(outcome) if outcome.status == TaskStatus::Completed => {
                            (EventType::Completed, outcome.message())
                        }
                        Some(outcome) => (EventType::Error, outcome.message()),
                        None => (EventType::Error, "Destruction failed".to_string()),
                    };
                    return Some(self.event(event_type, None, 1.0, message));
                }
                Phase::Done => return None,
            }
        }
    }
}
