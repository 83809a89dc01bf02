//! # escrow-cli — CLI Tool for the Escrow Ledger Stack
//!
//! Provides the `escrow` command-line interface.
//!
//! ## Subcommands
//!
//! - `escrow run <SCENARIO_YAML>`: execute a scripted scenario against a
//!   fresh registry with a manual clock and an in-memory rail.
//! - `escrow check-config`: print the resolved configuration.
//!
//! ```bash
//! escrow -v run scenarios/settlement.yaml
//! ESCROW_LOG_FORMAT=json escrow --config escrow.yaml check-config
//! ```

pub mod config;
pub mod scenario;

pub use config::{ConfigError, EscrowConfig, LogFormat};
pub use scenario::{Scenario, ScenarioError, ScenarioReport, ScenarioRunner};
