// SPDX-License-Identifier: PMPL-1.0-or-later

//! Policy validation: confirmation, severity ceiling and path allow/block lists.
//!
//! Validation is pure and deterministic. It runs before any task exists, so a
//! rejected request never touches the filesystem.

use crate::error::Rejection;
use crate::types::{DestructionRequest, Severity};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// How a configured prefix is compared against a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMatching {
    /// Whole path components: `/tmp` covers `/tmp/x` but not `/tmp2`.
    #[default]
    Segment,
    /// Plain string prefix: `/tmp` also covers `/tmp2`.
    Literal,
}

/// Read-only policy shared by every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub severity_ceiling: Severity,
    #[serde(default)]
    pub allowed_prefixes: Vec<String>,
    #[serde(default)]
    pub blocked_prefixes: Vec<String>,
    #[serde(default = "default_confirmation")]
    pub confirmation_required: bool,
    #[serde(default)]
    pub matching: PathMatching,
}

fn default_confirmation() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            severity_ceiling: Severity::Medium,
            allowed_prefixes: Vec::new(),
            blocked_prefixes: Vec::new(),
            confirmation_required: true,
            matching: PathMatching::Segment,
        }
    }
}

impl Policy {
    pub fn is_blocked(&self, target: &str) -> bool {
        self.blocked_prefixes
            .iter()
            .any(|prefix| matches_prefix(target, prefix, self.matching))
    }

    /// True when the allow-list is empty or some entry covers `target`.
    pub fn is_allowed(&self, target: &str) -> bool {
        self.allowed_prefixes.is_empty()
            || self
                .allowed_prefixes
                .iter()
                .any(|prefix| matches_prefix(target, prefix, self.matching))
    }

    /// Block-then-allow check for a single target.
    pub fn check_target(&self, target: &str) -> Result<(), Rejection> {
        if self.is_blocked(target) {
            return Err(Rejection::Blocked(target.to_string()));
        }
        if !self.is_allowed(target) {
            return Err(Rejection::NotAllowed(target.to_string()));
        }
        Ok(())
    }
}

/// Decide whether `request` may run under `policy`.
///
/// Checks run in a fixed order and stop at the first failure: confirmation,
/// severity ceiling, then each target in request order (block before allow).
pub fn validate(request: &DestructionRequest, policy: &Policy) -> Result<(), Rejection> {
    if policy.confirmation_required && !request.confirmed {
        return Err(Rejection::ConfirmationRequired);
    }

    if request.severity.rank() > policy.severity_ceiling.rank() {
        return Err(Rejection::SeverityExceeded {
            requested: request.severity,
            ceiling: policy.severity_ceiling,
        });
    }

    for target in &request.targets {
        policy.check_target(target)?;
    }

    Ok(())
}

/// Lexically fold `.` and `..` without touching the filesystem.
pub fn normalize(target: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(target.trim()).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn has_traversal(target: &str) -> bool {
    Path::new(target)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

fn matches_prefix(target: &str, prefix: &str, matching: PathMatching) -> bool {
    if prefix.trim().is_empty() {
        return false;
    }
    let target = normalize(target);
    match matching {
        PathMatching::Segment => target.starts_with(normalize(prefix)),
        // The prefix is compared as written, so a trailing `/` still counts.
        PathMatching::Literal => target.to_string_lossy().starts_with(prefix),
    }
}
