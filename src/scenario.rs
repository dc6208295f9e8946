// SPDX-License-Identifier: PMPL-1.0-or-later

//! Destruction scenarios: ordered sets of requests sharing one reference id.
//!
//! A scenario only produces ordinary requests. Each step still goes through
//! the engine's validation like any hand-written request.

use crate::types::{DestructionCategory, DestructionRequest, Severity};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub order: u32,
    #[serde(rename = "type")]
    pub category: DestructionCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub targets: Vec<String>,
    /// Operator-facing notes on what the step would run. Never executed.
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub risk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario: Scenario = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("parsing json scenario {}", path.display()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("parsing yaml scenario {}", path.display()))?,
            _ => return Err(anyhow!("unsupported scenario extension for {}", path.display())),
        };
        scenario.check()?;
        Ok(scenario)
    }

    pub fn check(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("scenario id must not be empty");
        }
        if self.steps.is_empty() {
            bail!("scenario {} has no steps", self.id);
        }
        Ok(())
    }

    /// One request per step, in step order, all tagged with this scenario's id.
    pub fn requests(&self, confirmed: bool) -> Vec<DestructionRequest> {
        let mut steps: Vec<&ScenarioStep> = self.steps.iter().collect();
        steps.sort_by_key(|step| step.order);
        steps
            .into_iter()
            .map(|step| {
                DestructionRequest::new(step.category, step.targets.iter().cloned())
                    .with_severity(self.severity)
                    .confirmed(confirmed)
                    .with_scenario(self.id.clone())
            })
            .collect()
    }
}
