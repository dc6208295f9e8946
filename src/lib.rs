// SPDX-License-Identifier: PMPL-1.0-or-later

//! burndevice: a policy-gated destruction engine for resilience testing.
//!
//! Requests name a category, a set of targets and a severity. The policy
//! validator decides whether a request may run at all; accepted requests
//! become registered tasks executed by a per-category strategy, reported
//! either as a single response or as a stream of progress events, and
//! audited on every outcome.
//!
//! Only file deletion touches the host, and it always backs a file up and
//! verifies the copy before removing the original. Every other category is
//! simulated.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod registry;
pub mod report;
pub mod scenario;
pub mod strategy;
pub mod stream;
pub mod task;
pub mod telemetry;
pub mod types;

pub use engine::{DestructionEngine, TaskFailure, TaskOutcome};
pub use error::{Rejection, StrategyError, TargetError, TransportError};
pub use policy::{PathMatching, Policy};
pub use stream::{DestructionStream, EventSink, JsonLinesSink};
pub use task::{CancelToken, TaskId, TaskStatus};
pub use types::{
    DestructionCategory, DestructionRequest, DestructionResponse, DestructionResult, Event,
    EventType, Metrics, Severity,
};
