// SPDX-License-Identifier: PMPL-1.0-or-later

//! Simulated strategies for categories without real destructive mechanics.
//!
//! These report one aggregate success covering the whole target set and a
//! fixed nominal duration. Nothing on the host is touched.

use super::{Strategy, TargetScope};
use crate::error::TargetError;
use crate::types::{DestructionCategory, Metrics};
use std::time::Duration;

pub const NOMINAL_DURATION: Duration = Duration::from_secs(1);

pub struct Simulated {
    category: DestructionCategory,
}

impl Simulated {
    pub fn new(category: DestructionCategory) -> Self {
        Self { category }
    }

    pub fn description(&self) -> &'static str {
        // Shown in logs.
        match self.category {
            DestructionCategory::FileDeletion => "Remove files after taking a backup",
            DestructionCategory::RegistryCorruption => "Corrupt configuration registry keys",
            DestructionCategory::ServiceTermination => "Terminate running system services",
            DestructionCategory::MemoryExhaustion => "Exhaust available memory with large allocations",
            DestructionCategory::DiskFill => "Fill disk space until writes fail",
            DestructionCategory::NetworkDisruption => "Disrupt network interfaces and connections",
            DestructionCategory::BootCorruption => "Corrupt boot configuration",
            DestructionCategory::KernelPanic => "Trigger a kernel panic",
        }
    }
}

impl Strategy for Simulated {
    fn category(&self) -> DestructionCategory {
        self.category
    }

    fn scope(&self) -> TargetScope {
        TargetScope::Aggregate
    }

    fn run_target(&self, target: &str) -> Result<Metrics, TargetError> {
        tracing::info!(
            category = %self.category,
            targets = target,
            action = self.description(),
            "simulated destruction completed"
        );
        Ok(Metrics::default())
    }

    fn nominal_duration(&self) -> Option<Duration> {
        Some(NOMINAL_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::run_unit;

    #[test]
    fn aggregate_unit_reports_nominal_duration() {
        let strategy = Simulated::new(DestructionCategory::ServiceTermination);
        let targets = vec!["nginx".to_string(), "postgres".to_string()];
        let units = strategy.units(&targets);
        assert_eq!(units.len(), 1);

        let result = run_unit(&strategy, &units[0]).unwrap();
        assert!(result.success);
        assert_eq!(result.target, "nginx,postgres");
        assert_eq!(result.metrics.execution_time_seconds, 1.0);
        assert_eq!(result.metrics.files_deleted, 0);
    }

    #[test]
    fn every_simulated_category_is_described() {
        for category in DestructionCategory::all() {
            if category != DestructionCategory::FileDeletion {
                assert!(!Simulated::new(category).description().is_empty());
            }
        }
    }
}
