// SPDX-License-Identifier: PMPL-1.0-or-later

//! burndevice: policy-gated destruction for resilience testing
//!
//! Every request is checked against the configured policy before anything
//! runs. File deletion keeps a verified backup; other categories are simulated.

use anyhow::Result;
use burndevice::config::Config;
use burndevice::report::ReportFormatter;
use burndevice::scenario::Scenario;
use burndevice::stream::JsonLinesSink;
use burndevice::telemetry;
use burndevice::{CancelToken, DestructionCategory, DestructionEngine, DestructionRequest, Severity};
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "burndevice")]
#[command(version)]
#[command(about = "Policy-gated destruction engine for resilience testing")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a request and print the response
    Execute(RequestArgs),

    /// Execute a request and print progress events as they happen
    Stream(RequestArgs),

    /// Run the policy check only
    Check(RequestArgs),

    /// Execute every step of a scenario file in order
    Scenario {
        /// Scenario file (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Confirm every step of the scenario
        #[arg(long)]
        confirm: bool,
    },

    /// Load and validate a configuration file
    ValidateConfig {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Destruction category
    #[arg(long, value_enum)]
    category: CategoryArg,

    /// Target to act on (repeatable)
    #[arg(short, long = "target", value_name = "TARGET")]
    targets: Vec<String>,

    /// Requested severity
    #[arg(short, long, value_enum, default_value = "low")]
    severity: SeverityArg,

    /// Confirm the destructive action
    #[arg(long)]
    confirm: bool,

    /// Scenario this request belongs to
    #[arg(long)]
    scenario_ref: Option<String>,
}

impl RequestArgs {
    fn request(&self) -> DestructionRequest {
        let request = DestructionRequest::new(self.category.into(), self.targets.iter().cloned())
            .with_severity(self.severity.into())
            .confirmed(self.confirm);
        match &self.scenario_ref {
            Some(reference) => request.with_scenario(reference.clone()),
            None => request,
        }
    }
}

// CLI argument types
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CategoryArg {
    FileDeletion,
    RegistryCorruption,
    ServiceTermination,
    MemoryExhaustion,
    DiskFill,
    NetworkDisruption,
    BootCorruption,
    KernelPanic,
}

impl From<CategoryArg> for DestructionCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::FileDeletion => DestructionCategory::FileDeletion,
            CategoryArg::RegistryCorruption => DestructionCategory::RegistryCorruption,
            CategoryArg::ServiceTermination => DestructionCategory::ServiceTermination,
            CategoryArg::MemoryExhaustion => DestructionCategory::MemoryExhaustion,
            CategoryArg::DiskFill => DestructionCategory::DiskFill,
            CategoryArg::NetworkDisruption => DestructionCategory::NetworkDisruption,
            CategoryArg::BootCorruption => DestructionCategory::BootCorruption,
            CategoryArg::KernelPanic => DestructionCategory::KernelPanic,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SeverityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    }
}

/// Load configuration, install logging and build the engine.
fn setup(config: Option<&Path>) -> Result<DestructionEngine> {
    let config = load_config(config)?;
    telemetry::init_logging(&config.log_level, config.log_format)?;
    DestructionEngine::from_config(&config)
}

fn main() -> Result<ExitCode> {
    let ok = run(Cli::parse())?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Runs one command; `Ok(false)` means the command itself reported failure.
fn run(cli: Cli) -> Result<bool> {
    let Cli {
        config,
        json,
        command,
    } = cli;
    let formatter = ReportFormatter::new();
    let cancel = CancelToken::new();

    match command {
        Commands::ValidateConfig { file } => {
            let config = Config::load(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                formatter.print_config(&config);
            }
            Ok(true)
        }

        Commands::Execute(args) => {
            let engine = setup(config.as_deref())?;
            let response = engine.execute(&args.request(), &cancel);
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                formatter.print_response(&response);
            }
            Ok(response.success)
        }

        Commands::Stream(args) => {
            let engine = setup(config.as_deref())?;
            let stream = match engine.stream(&args.request(), &cancel) {
                Ok(stream) => stream,
                Err(rejection) => {
                    eprintln!("Validation failed: {}", rejection);
                    return Ok(false);
                }
            };
            let outcome = if json {
                stream.drive(&mut JsonLinesSink::new(io::stdout().lock()))?
            } else {
                stream.drive(&mut ReportFormatter::new())?
            };
            Ok(outcome.failure.is_none())
        }

        Commands::Check(args) => {
            let engine = setup(config.as_deref())?;
            let request = args.request();
            let verdict = engine.check(&request);
            if json {
                let body = serde_json::json!({
                    "allowed": verdict.is_ok(),
                    "reason": verdict.as_ref().err().map(ToString::to_string),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                formatter.print_verdict(&request, &verdict);
            }
            Ok(verdict.is_ok())
        }

        Commands::Scenario { file, confirm } => {
            let engine = setup(config.as_deref())?;
            let scenario = Scenario::load(&file)?;
            if !json {
                formatter.print_scenario(&scenario);
            }
            for (step, request) in scenario.requests(confirm).iter().enumerate() {
                let response = engine.execute(request, &cancel);
                if json {
                    println!("{}", serde_json::to_string(&response)?);
                } else {
                    println!("\nStep {} ({})", step + 1, request.category);
                    formatter.print_response(&response);
                }
                if !response.success {
                    tracing::warn!(scenario = %scenario.id, step = step + 1, "scenario stopped at failed step");
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}
