//! storage-harness - contract round-trip test runner
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in "Simple storage" suite
//! storage-harness suite --value 10
//!
//! # Execute YAML scenarios
//! storage-harness run scenarios/simple_storage_roundtrip.yaml scenarios/manual_mining.yaml
//!
//! # Inspect a failure artifact
//! storage-harness replay artifacts/Simple_storage_should_store_a_value_20260101_120000123.json
//! ```
//!
//! Exits with 0 when everything passes and 1 otherwise.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use storage_testing_framework::config::HarnessConfig;
use storage_testing_framework::contract::ContractRegistry;
use storage_testing_framework::roundtrip::parse_value;
use storage_testing_framework::scenarios::{load_scenario, ScenarioExecutor};
use storage_testing_framework::suite::builtin_simple_storage_suite;
use storage_testing_framework::utilities::{load_artifact, print_artifact_summary, validate_artifact};

/// Contract round-trip test runner
#[derive(Parser)]
#[command(name = "storage-harness")]
#[command(about = "Deterministic contract store/retrieve test runner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in "Simple storage" suite
    Suite {
        /// Value to store and read back (decimal or 0x hex)
        #[arg(short, long, default_value = "10")]
        value: String,

        /// Harness config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Execute scenario files
    Run {
        /// Scenario files (YAML)
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,

        /// Harness config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print and check a failure artifact
    Replay {
        /// Artifact file (JSON)
        artifact: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    config.validate()?;
    Ok(config)
}

async fn run_suite(value: &str, config: Option<&Path>) -> Result<bool> {
    let config = load_config(config)?;
    let value = parse_value(value)?;

    let report = builtin_simple_storage_suite(value).run(&config).await;
    report.print();
    Ok(report.success())
}

async fn run_scenarios(paths: &[PathBuf], config: Option<&Path>) -> Result<bool> {
    let config = load_config(config)?;
    let registry = Arc::new(ContractRegistry::with_builtin());
    if let Some(dir) = &config.artifacts_dir {
        let count = registry.load_dir(dir)?;
        log::info!("Loaded {} contract artifact(s) from {}", count, dir.display());
    }

    let mut executor = ScenarioExecutor::new()
        .with_config(config)
        .with_registry(registry);

    let mut all_passed = true;
    for path in paths {
        let outcome = match load_scenario(path).await {
            Ok(scenario) => executor.execute(scenario).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(report) => report.print(),
            Err(e) => {
                all_passed = false;
                eprintln!("✗ {}: {:#}", path.display(), e);
                for line in executor.get_log() {
                    eprintln!("{}", line);
                }
            }
        }
    }
    Ok(all_passed)
}

async fn replay(path: &Path) -> Result<bool> {
    let artifact = load_artifact(path).await?;
    print_artifact_summary(&artifact);

    match validate_artifact(&artifact) {
        Ok(()) => Ok(true),
        Err(e) => {
            eprintln!("Artifact is inconsistent: {:#}", e);
            Ok(false)
        }
    }
}

// Scenarios pause tokio time, which needs a current-thread runtime
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Suite { value, config } => run_suite(value, config.as_deref()).await,
        Commands::Run { scenarios, config } => run_scenarios(scenarios, config.as_deref()).await,
        Commands::Replay { artifact } => replay(artifact).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
