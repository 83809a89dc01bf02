//! # escrow CLI entry point
//!
//! Parses command-line arguments, sets up tracing, and dispatches to the
//! subcommand handlers.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use escrow_cli::{EscrowConfig, LogFormat, Scenario, ScenarioRunner};

/// Escrow ledger toolchain.
///
/// Runs scripted escrow scenarios and inspects configuration.
#[derive(Parser, Debug)]
#[command(name = "escrow", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a scenario script and print every notification as JSON.
    Run {
        /// Path to the scenario YAML file.
        #[arg(value_name = "SCENARIO_YAML")]
        scenario: PathBuf,
    },

    /// Print the resolved configuration.
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match EscrowConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    init_tracing(cli.verbose, config.log_format);
    tracing::debug!(?config, "escrow CLI starting");

    let result = match cli.command {
        Commands::Run { scenario } => run_scenario(config, &scenario),
        Commands::CheckConfig => check_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn run_scenario(config: EscrowConfig, path: &Path) -> Result<()> {
    let scenario = Scenario::from_file(path)?;
    let report = ScenarioRunner::run(config, &scenario)
        .with_context(|| format!("scenario {} failed", path.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for line in &report.lines {
        writeln!(out, "{}", serde_json::to_string(line)?)?;
    }
    for (name, snapshot) in &report.snapshots {
        let snapshot = serde_json::to_value(snapshot)?;
        let line = serde_json::json!({ "escrow": name, "snapshot": snapshot });
        writeln!(out, "{line}")?;
    }
    let accounts = serde_json::to_value(&report.accounts)?;
    let summary = serde_json::json!({ "accounts": accounts, "conserved": report.conserved });
    writeln!(out, "{summary}")?;
    Ok(())
}

fn check_config(config: &EscrowConfig) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
