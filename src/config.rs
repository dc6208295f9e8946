// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration: file (YAML or JSON) first, then `BURNDEVICE_*` environment
//! overrides, then validation.

use crate::policy::{PathMatching, Policy};
use crate::telemetry::{LogFormat, DEFAULT_LOG_LEVEL};
use crate::types::Severity;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "BURNDEVICE_";
const SEVERITY_NAMES: [&str; 4] = ["LOW", "MEDIUM", "HIGH", "CRITICAL"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
            security: SecurityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub require_confirmation: bool,
    pub max_severity: String,
    pub allowed_targets: Vec<String>,
    pub blocked_targets: Vec<String>,
    pub audit_log: bool,
    /// JSON-lines audit file. Records go to the log when unset.
    pub audit_path: Option<PathBuf>,
    pub path_matching: PathMatching,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            max_severity: "MEDIUM".to_string(),
            allowed_targets: Vec::new(),
            blocked_targets: default_blocked_targets(),
            audit_log: true,
            audit_path: None,
            path_matching: PathMatching::Segment,
        }
    }
}

fn default_blocked_targets() -> Vec<String> {
    [
        "/bin",
        "/boot",
        "/dev",
        "/etc",
        "/lib",
        "/proc",
        "/sbin",
        "/sys",
        "/usr",
        "/var",
        "/home",
        "/root",
        "C:\\Windows",
        "C:\\Program Files",
        "C:\\Users",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl SecurityConfig {
    pub fn policy(&self) -> Policy {
        Policy {
            severity_ceiling: Severity::from_rank(severity_rank(&self.max_severity)),
            allowed_prefixes: self.allowed_targets.clone(),
            blocked_prefixes: self.blocked_targets.clone(),
            confirmation_required: self.require_confirmation,
            matching: self.path_matching,
        }
    }
}

/// Rank of a severity name: LOW 1, MEDIUM 2, HIGH 3, CRITICAL 4.
/// Anything else, including the empty string, ranks as LOW.
pub fn severity_rank(name: &str) -> u8 {
    match name.trim().to_ascii_uppercase().as_str() {
        "LOW" => 1,
        "MEDIUM" => 2,
        "HIGH" => 3,
        "CRITICAL" => 4,
        _ => 1,
    }
}

impl Config {
    /// Load `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("parsing json config {}", path.display()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("parsing yaml config {}", path.display()))?,
            _ => return Err(anyhow!("unsupported config extension for {}", path.display())),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Apply overrides from `lookup`, keyed without the `BURNDEVICE_` prefix.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.log_format = format.parse()?;
        }
        let security = &mut self.security;
        if let Some(severity) = lookup("SECURITY_MAX_SEVERITY") {
            security.max_severity = severity;
        }
        if let Some(flag) = lookup("SECURITY_REQUIRE_CONFIRMATION") {
            security.require_confirmation = parse_bool("SECURITY_REQUIRE_CONFIRMATION", &flag)?;
        }
        if let Some(flag) = lookup("SECURITY_AUDIT_LOG") {
            security.audit_log = parse_bool("SECURITY_AUDIT_LOG", &flag)?;
        }
        if let Some(list) = lookup("SECURITY_ALLOWED_TARGETS") {
            security.allowed_targets = split_list(&list);
        }
        if let Some(list) = lookup("SECURITY_BLOCKED_TARGETS") {
            security.blocked_targets = split_list(&list);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let severity = self.security.max_severity.trim().to_ascii_uppercase();
        if !SEVERITY_NAMES.contains(&severity.as_str()) {
            bail!(
                "invalid max_severity {:?}: expected one of {}",
                self.security.max_severity,
                SEVERITY_NAMES.join(", ")
            );
        }
        if self.log_level.trim().is_empty() {
            bail!("log_level must not be empty");
        }
        Ok(())
    }

    /// Settings an operator should look at twice.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.security.require_confirmation {
            warnings.push("confirmation is disabled: requests run without explicit consent".into());
        }
        if severity_rank(&self.security.max_severity) >= 3 {
            warnings.push(format!(
                "max_severity is {}: high-impact categories are permitted",
                self.security.max_severity.to_ascii_uppercase()
            ));
        }
        if !self.security.audit_log {
            warnings.push("audit logging is disabled".into());
        }
        if self.security.blocked_targets.is_empty() {
            warnings.push("blocked_targets is empty: system paths are not protected".into());
        }
        warnings
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{ENV_PREFIX}{key}: expected a boolean, got {:?}", other),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
