// SPDX-License-Identifier: PMPL-1.0-or-later

//! Execution strategies, one per destruction category.

pub mod file;
pub mod simulated;

use crate::error::{StrategyError, TargetError};
use crate::policy::Policy;
use crate::types::{DestructionCategory, DestructionResult, Metrics};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use file::{FileDeletion, BACKUP_SUFFIX};
pub use simulated::Simulated;

/// Whether a strategy works target by target or on the whole set at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScope {
    PerTarget,
    Aggregate,
}

pub trait Strategy: Send {
    fn category(&self) -> DestructionCategory;

    fn scope(&self) -> TargetScope {
        TargetScope::PerTarget
    }

    /// Whole-task precondition; an error here fails the task before any target.
    fn prepare(&self, _targets: &[String]) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Act on one unit. Failures stay confined to that unit's result.
    fn run_target(&self, target: &str) -> Result<Metrics, TargetError>;

    /// Fixed duration reported instead of measured wall-clock time.
    fn nominal_duration(&self) -> Option<Duration> {
        None
    }

    /// Units of work in processing order.
    fn units(&self, targets: &[String]) -> Vec<String> {
        match self.scope() {
            TargetScope::PerTarget => targets.to_vec(),
            TargetScope::Aggregate if targets.is_empty() => Vec::new(),
            TargetScope::Aggregate => vec![targets.join(",")],
        }
    }
}

/// Pick the strategy for `category`.
pub fn select(category: DestructionCategory, policy: &Arc<Policy>) -> Box<dyn Strategy> {
    match category {
        DestructionCategory::FileDeletion => Box::new(FileDeletion::new(Arc::clone(policy))),
        DestructionCategory::RegistryCorruption
        | DestructionCategory::ServiceTermination
        | DestructionCategory::MemoryExhaustion
        | DestructionCategory::DiskFill
        | DestructionCategory::NetworkDisruption
        | DestructionCategory::BootCorruption
        | DestructionCategory::KernelPanic => Box::new(Simulated::new(category)),
    }
}

/// Time one unit and fold its outcome into a result.
///
/// A panic inside the strategy becomes a `StrategyError`; target failures
/// become a failed result.
pub(crate) fn run_unit<S: Strategy + ?Sized>(
    strategy: &S,
    unit: &str,
) -> Result<DestructionResult, StrategyError> {
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy.run_target(unit)));
    let elapsed = strategy
        .nominal_duration()
        .unwrap_or_else(|| start.elapsed())
        .as_secs_f64();

    match outcome {
        Ok(Ok(mut metrics)) => {
            metrics.execution_time_seconds = elapsed;
            Ok(DestructionResult::succeeded(unit, metrics))
        }
        Ok(Err(err)) => {
            tracing::warn!(target_path = unit, error = %err, "target failed");
            let metrics = Metrics {
                execution_time_seconds: elapsed,
                ..Metrics::default()
            };
            Ok(DestructionResult::failed(unit, err.to_string(), metrics))
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(target_path = unit, %message, "strategy panicked");
            Err(StrategyError::Panicked {
                target: unit.to_string(),
                message,
            })
        }
    }
}
