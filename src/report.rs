// SPDX-License-Identifier: PMPL-1.0-or-later

//! Terminal output for responses, events and configuration summaries

use crate::config::Config;
use crate::error::{Rejection, TransportError};
use crate::scenario::Scenario;
use crate::stream::EventSink;
use crate::types::{DestructionRequest, DestructionResponse, Event, EventType};
use colored::*;

pub struct ReportFormatter;

impl ReportFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn print_response(&self, response: &DestructionResponse) {
        println!("\n{}", "=== BURNDEVICE RESPONSE ===".bold().cyan());
        let status = if response.success {
            "SUCCESS".green().bold()
        } else {
            "FAILED".red().bold()
        };
        println!("  Status: {}", status);
        println!("  Message: {}", response.message);
        if let Some(task_id) = &response.task_id {
            println!("  Task: {}", task_id);
        }
        println!("  Timestamp: {}", response.timestamp.to_rfc3339());

        if response.results.is_empty() {
            return;
        }
        println!();
        println!("{}", "RESULTS".bold().yellow());
        for result in &response.results {
            let mark = if result.success {
                "OK".green()
            } else {
                "FAILED".red()
            };
            println!(
                "  [{}] {} ({} files, {} bytes, {:.3}s)",
                mark,
                result.target,
                result.metrics.files_deleted,
                result.metrics.bytes_destroyed,
                result.metrics.execution_time_seconds
            );
            if let Some(error) = &result.error_message {
                println!("      {}", error.red());
            }
        }
        println!();
    }

    pub fn print_event(&self, event: &Event) {
        let label = match event.event_type {
            EventType::Started => "STARTED".cyan().bold(),
            EventType::Progress => "PROGRESS".blue(),
            EventType::Completed => "COMPLETED".green().bold(),
            EventType::Error => "ERROR".red().bold(),
            EventType::Warning => "WARNING".yellow().bold(),
        };
        println!(
            "[{:>5.1}%] {:<9} {}",
            event.progress * 100.0,
            label,
            event.message
        );
    }

    pub fn print_verdict(&self, request: &DestructionRequest, verdict: &Result<(), Rejection>) {
        println!("\n{}", "=== POLICY CHECK ===".bold().cyan());
        println!("  Category: {}", request.category);
        println!("  Severity: {}", request.severity);
        println!("  Targets: {}", request.targets.join(", "));
        match verdict {
            Ok(()) => println!("  Verdict: {}", "ALLOWED".green().bold()),
            Err(rejection) => {
                println!("  Verdict: {}", "REJECTED".red().bold());
                println!("  Reason: {}", rejection);
            }
        }
        println!();
    }

    pub fn print_scenario(&self, scenario: &Scenario) {
        println!("\n{}", format!("=== SCENARIO {} ===", scenario.id).bold().cyan());
        if !scenario.description.is_empty() {
            println!("  {}", scenario.description);
        }
        println!("  Severity: {}", scenario.severity);
        println!("  Steps: {}", scenario.steps.len());
        for warning in &scenario.warnings {
            println!("  {} {}", "warning:".yellow().bold(), warning);
        }
    }

    pub fn print_config(&self, config: &Config) {
        let security = &config.security;
        println!("\n{}", "=== CONFIGURATION ===".bold().cyan());
        println!("  Log level: {}", config.log_level);
        println!("  Log format: {}", config.log_format);
        println!("  Require confirmation: {}", security.require_confirmation);
        println!("  Max severity: {}", security.max_severity.to_ascii_uppercase());
        println!("  Allowed targets: {}", list_or_any(&security.allowed_targets));
        println!("  Blocked targets: {}", security.blocked_targets.len());
        println!("  Audit log: {}", security.audit_log);
        if let Some(path) = &security.audit_path {
            println!("  Audit path: {}", path.display());
        }

        let warnings = config.warnings();
        if warnings.is_empty() {
            println!("  {}", "Configuration is valid".green());
        } else {
            println!();
            println!("{}", "WARNINGS".bold().yellow());
            for warning in warnings {
                println!("  - {}", warning.yellow());
            }
        }
        println!();
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints each event as it arrives.
impl EventSink for ReportFormatter {
    fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        self.print_event(event);
        Ok(())
    }
}

fn list_or_any(items: &[String]) -> String {
    if items.is_empty() {
        "(any not blocked)".to_string()
    } else {
        items.join(", ")
    }
}
