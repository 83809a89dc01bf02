//! # Scenario Runner
//!
//! Drives an [`EscrowRegistry`] from a YAML script against a manual clock
//! and an in-memory value rail. Every notification becomes one JSON output
//! line; the final snapshot of each escrow follows.
//!
//! ```yaml
//! start: "2026-01-01T00:00:00Z"
//! steps:
//!   - { op: fund, account: alice, amount: 500 }
//!   - { op: create, escrow: deal, caller: alice, beneficiary: bob, arbiter: carol,
//!       deadline_secs: 86400, grace_secs: 3600 }
//!   - { op: deposit, escrow: deal, caller: alice, amount: 100 }
//!   - { op: lock, escrow: deal, caller: carol }
//!   - { op: settle, escrow: deal, caller: carol, to_depositor: 100, to_beneficiary: 0 }
//!   - { op: settle, escrow: deal, caller: carol, to_depositor: 1, to_beneficiary: 0,
//!       expect_error: insufficient_balance }
//! ```
//!
//! A step with `expect_error` must fail with exactly that error kind. Any
//! other outcome, and any failure of a step without `expect_error`, stops
//! the run.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use escrow_core::{Address, Amount, Clock, ManualClock, Timestamp};
use escrow_ledger::{
    InMemoryRail, LedgerError, LedgerErrorKind, LedgerEvent, LedgerSnapshot, SharedLedger,
    SharedRail, TransferError,
};
use escrow_registry::{EscrowRegistry, RegistryError, RegistryEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EscrowConfig;

/// A parsed scenario script.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Initial clock reading. Defaults to the current time.
    #[serde(default)]
    pub start: Option<Timestamp>,
    /// Steps, run in order.
    pub steps: Vec<Step>,
}

/// One scripted step.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// What to do.
    #[serde(flatten)]
    pub action: Action,
    /// Error kind the step must fail with, e.g. `insufficient_balance`.
    #[serde(default)]
    pub expect_error: Option<String>,
}

/// A scripted action. Escrows are referred to by script-local names.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Action {
    /// Credit a rail account with fresh value.
    Fund {
        /// Account to credit.
        account: Address,
        /// Amount to mint.
        amount: Amount,
    },
    /// Create an escrow through the registry.
    Create {
        /// Script-local name.
        escrow: String,
        /// Creator, who becomes depositor.
        caller: Address,
        /// Beneficiary.
        beneficiary: Address,
        /// Arbiter.
        arbiter: Address,
        /// Deadline in seconds; falls back to the configured default.
        #[serde(default)]
        deadline_secs: Option<i64>,
        /// Grace window in seconds; falls back to the configured default.
        #[serde(default)]
        grace_secs: Option<i64>,
    },
    /// Deposit into an escrow.
    Deposit {
        /// Target escrow.
        escrow: String,
        /// Caller.
        caller: Address,
        /// Attached value.
        amount: Amount,
    },
    /// Lock deposits.
    Lock {
        /// Target escrow.
        escrow: String,
        /// Caller.
        caller: Address,
    },
    /// Unlock deposits.
    Unlock {
        /// Target escrow.
        escrow: String,
        /// Caller.
        caller: Address,
    },
    /// Settle with a split.
    Settle {
        /// Target escrow.
        escrow: String,
        /// Caller.
        caller: Address,
        /// Amount paid to the depositor.
        to_depositor: Amount,
        /// Amount paid to the beneficiary.
        to_beneficiary: Amount,
    },
    /// Withdraw the caller's balance after the deadline.
    WithdrawAfterDeadline {
        /// Target escrow.
        escrow: String,
        /// Caller.
        caller: Address,
    },
    /// Trigger the grace-window refund.
    GraceWithdraw {
        /// Target escrow.
        escrow: String,
        /// Caller.
        caller: Address,
    },
    /// Move the clock forward.
    Advance {
        /// Seconds to advance.
        secs: i64,
    },
    /// Make payouts to an account fail (`reject: true`) or succeed again.
    RejectPayouts {
        /// Account.
        account: Address,
        /// Whether payouts should fail.
        #[serde(default = "default_true")]
        reject: bool,
    },
}

fn default_true() -> bool {
    true
}

impl Scenario {
    /// Read and parse a scenario file.
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a scenario from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Errors that stop a scenario run.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario {path}: {source}")]
    Io {
        /// The scenario path.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The scenario is not valid YAML for [`Scenario`].
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A step names an escrow that was never created.
    #[error("step {step}: unknown escrow `{name}`")]
    UnknownEscrow {
        /// Step index.
        step: usize,
        /// The unknown name.
        name: String,
    },
    /// A `create` step reuses a name.
    #[error("step {step}: escrow `{name}` already exists")]
    DuplicateEscrow {
        /// Step index.
        step: usize,
        /// The reused name.
        name: String,
    },
    /// `expect_error` names no known error kind.
    #[error("step {step}: unknown error kind `{kind}`")]
    UnknownErrorKind {
        /// Step index.
        step: usize,
        /// The unknown kind.
        kind: String,
    },
    /// A step failed without `expect_error`.
    #[error("step {step} failed: {source}")]
    StepFailed {
        /// Step index.
        step: usize,
        /// The ledger error.
        source: LedgerError,
    },
    /// A step with `expect_error` succeeded.
    #[error("step {step}: expected {expected} but the step succeeded")]
    ExpectedFailure {
        /// Step index.
        step: usize,
        /// The expected kind.
        expected: LedgerErrorKind,
    },
    /// A step failed with a different kind than expected.
    #[error("step {step}: expected {expected}, got {actual}: {message}")]
    WrongError {
        /// Step index.
        step: usize,
        /// The expected kind.
        expected: LedgerErrorKind,
        /// The actual kind.
        actual: LedgerErrorKind,
        /// The actual error message.
        message: String,
    },
    /// Funding the rail failed.
    #[error("step {step}: funding failed: {source}")]
    Funding {
        /// Step index.
        step: usize,
        /// The rail error.
        source: TransferError,
    },
    /// A duration in seconds is too large to represent.
    #[error("step {step}: duration of {secs}s is out of range")]
    DurationOutOfRange {
        /// Step index.
        step: usize,
        /// The requested duration.
        secs: i64,
    },
    /// The clock cannot advance that far.
    #[error("step {step}: clock cannot advance by {secs}s")]
    ClockOverflow {
        /// Step index.
        step: usize,
        /// The requested advance.
        secs: i64,
    },
}

/// One output line of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputLine {
    /// Step index, starting at 0.
    pub step: usize,
    /// Script-local escrow name, when the step targets one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escrow: Option<String>,
    /// The notification or expected-failure record.
    #[serde(flatten)]
    pub body: Value,
}

/// The result of a completed run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Output lines in order.
    pub lines: Vec<OutputLine>,
    /// Final snapshot of each escrow, by name.
    pub snapshots: BTreeMap<String, LedgerSnapshot>,
    /// Final rail account balances of every funded account.
    pub accounts: BTreeMap<Address, Amount>,
    /// Whether every ledger satisfies conservation at the end.
    pub conserved: bool,
}

/// Executes a [`Scenario`].
#[derive(Debug)]
pub struct ScenarioRunner {
    config: EscrowConfig,
    clock: ManualClock,
    rail: Arc<Mutex<InMemoryRail>>,
    registry: EscrowRegistry,
    escrows: BTreeMap<String, SharedLedger>,
    funded: Vec<Address>,
    lines: Vec<OutputLine>,
}

impl ScenarioRunner {
    /// Create a runner whose clock starts at `start`.
    pub fn new(config: EscrowConfig, start: Timestamp) -> Self {
        let clock = ManualClock::new(start);
        let rail = Arc::new(Mutex::new(InMemoryRail::new()));
        let shared_rail: SharedRail = rail.clone();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        Self {
            config,
            clock,
            rail,
            registry: EscrowRegistry::new(shared_clock, shared_rail),
            escrows: BTreeMap::new(),
            funded: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Run every step of `scenario` and report.
    pub fn run(config: EscrowConfig, scenario: &Scenario) -> Result<ScenarioReport, ScenarioError> {
        let start = scenario.start.unwrap_or_else(Timestamp::now);
        let mut runner = Self::new(config, start);
        for (index, step) in scenario.steps.iter().enumerate() {
            runner.step(index, step)?;
        }
        Ok(runner.finish())
    }

    /// Execute one step.
    pub fn step(&mut self, index: usize, step: &Step) -> Result<(), ScenarioError> {
        let expected = match &step.expect_error {
            Some(kind) => Some(LedgerErrorKind::parse(kind).ok_or_else(|| {
                ScenarioError::UnknownErrorKind {
                    step: index,
                    kind: kind.clone(),
                }
            })?),
            None => None,
        };
        tracing::debug!(step = index, action = ?step.action, "running step");

        let (escrow, outcome) = match &step.action {
            Action::Fund { account, amount } => {
                self.rail
                    .lock()
                    .fund(account, *amount)
                    .map_err(|source| ScenarioError::Funding { step: index, source })?;
                if !self.funded.contains(account) {
                    self.funded.push(account.clone());
                }
                return Ok(());
            }
            Action::Advance { secs } => {
                Duration::try_seconds(*secs)
                    .and_then(|d| self.clock.advance(d))
                    .ok_or(ScenarioError::ClockOverflow {
                        step: index,
                        secs: *secs,
                    })?;
                return Ok(());
            }
            Action::RejectPayouts { account, reject } => {
                let mut rail = self.rail.lock();
                if *reject {
                    rail.reject_payouts_to(account);
                } else {
                    rail.accept_payouts_to(account);
                }
                return Ok(());
            }
            Action::Create {
                escrow,
                caller,
                beneficiary,
                arbiter,
                deadline_secs,
                grace_secs,
            } => {
                if self.escrows.contains_key(escrow) {
                    return Err(ScenarioError::DuplicateEscrow {
                        step: index,
                        name: escrow.clone(),
                    });
                }
                let deadline = duration(
                    index,
                    deadline_secs.unwrap_or(self.config.default_deadline_secs),
                )?;
                let grace = match grace_secs.or(self.config.default_grace_secs) {
                    Some(secs) => Some(duration(index, secs)?),
                    None => None,
                };
                let outcome = self
                    .registry
                    .create_escrow(caller, beneficiary, arbiter, deadline, grace)
                    .map(|handle| {
                        self.escrows.insert(escrow.clone(), handle);
                        self.registry
                            .events()
                            .last()
                            .map(|event| vec![registry_line(event)])
                            .unwrap_or_default()
                    })
                    .map_err(|RegistryError::Ledger(err)| err);
                (escrow, outcome)
            }
            Action::Deposit {
                escrow,
                caller,
                amount,
            } => (
                escrow,
                self.escrow(index, escrow)?
                    .deposit(caller, *amount)
                    .map(ledger_lines),
            ),
            Action::Lock { escrow, caller } => (
                escrow,
                self.escrow(index, escrow)?.lock_deposits(caller).map(ledger_lines),
            ),
            Action::Unlock { escrow, caller } => (
                escrow,
                self.escrow(index, escrow)?
                    .unlock_deposits(caller)
                    .map(ledger_lines),
            ),
            Action::Settle {
                escrow,
                caller,
                to_depositor,
                to_beneficiary,
            } => (
                escrow,
                self.escrow(index, escrow)?
                    .settle(caller, *to_depositor, *to_beneficiary)
                    .map(ledger_lines),
            ),
            Action::WithdrawAfterDeadline { escrow, caller } => (
                escrow,
                self.escrow(index, escrow)?
                    .withdraw_after_deadline(caller)
                    .map(ledger_lines),
            ),
            Action::GraceWithdraw { escrow, caller } => (
                escrow,
                self.escrow(index, escrow)?
                    .grace_period_withdraw(caller)
                    .map(ledger_lines),
            ),
        };

        let bodies = match (outcome, expected) {
            (Ok(bodies), None) => bodies,
            (Ok(_), Some(expected)) => {
                return Err(ScenarioError::ExpectedFailure {
                    step: index,
                    expected,
                })
            }
            (Err(source), None) => return Err(ScenarioError::StepFailed { step: index, source }),
            (Err(err), Some(expected)) if err.kind() == expected => {
                tracing::info!(step = index, kind = %expected, "step failed as expected");
                vec![serde_json::json!({
                    "expected_error": expected.as_str(),
                    "message": err.to_string(),
                })]
            }
            (Err(err), Some(expected)) => {
                return Err(ScenarioError::WrongError {
                    step: index,
                    expected,
                    actual: err.kind(),
                    message: err.to_string(),
                })
            }
        };

        self.lines.extend(bodies.into_iter().map(|body| OutputLine {
            step: index,
            escrow: Some(escrow.clone()),
            body,
        }));
        Ok(())
    }

    /// Collect the final report.
    pub fn finish(self) -> ScenarioReport {
        let snapshots: BTreeMap<String, LedgerSnapshot> = self
            .escrows
            .iter()
            .map(|(name, handle)| (name.clone(), handle.snapshot()))
            .collect();
        let conserved = self
            .escrows
            .values()
            .all(|handle| handle.with(|ledger| ledger.conservation_holds()));
        let rail = self.rail.lock();
        let accounts = self
            .funded
            .iter()
            .map(|account| (account.clone(), rail.balance_of(account)))
            .collect();
        ScenarioReport {
            lines: self.lines.clone(),
            snapshots,
            accounts,
            conserved,
        }
    }

    fn escrow(&self, step: usize, name: &str) -> Result<&SharedLedger, ScenarioError> {
        self.escrows
            .get(name)
            .ok_or_else(|| ScenarioError::UnknownEscrow {
                step,
                name: name.to_string(),
            })
    }
}

fn duration(step: usize, secs: i64) -> Result<Duration, ScenarioError> {
    Duration::try_seconds(secs).ok_or(ScenarioError::DurationOutOfRange { step, secs })
}

fn ledger_lines(events: Vec<LedgerEvent>) -> Vec<Value> {
    events.iter().filter_map(|e| serde_json::to_value(e).ok()).collect()
}

fn registry_line(event: &RegistryEvent) -> Value {
    serde_json::to_value(event).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = r#"
start: "2026-01-01T00:00:00Z"
steps:
  - { op: fund, account: alice, amount: 500 }
  - { op: fund, account: bob, amount: 500 }
  - { op: create, escrow: deal, caller: alice, beneficiary: bob, arbiter: carol, deadline_secs: 86400 }
  - { op: deposit, escrow: deal, caller: alice, amount: 100 }
  - { op: deposit, escrow: deal, caller: bob, amount: 50 }
  - { op: lock, escrow: deal, caller: carol }
  - { op: settle, escrow: deal, caller: carol, to_depositor: 100, to_beneficiary: 50 }
  - { op: settle, escrow: deal, caller: carol, to_depositor: 1, to_beneficiary: 0, expect_error: insufficient_balance }
"#;

    fn run(yaml: &str) -> Result<ScenarioReport, ScenarioError> {
        let scenario = Scenario::from_yaml(yaml)?;
        ScenarioRunner::run(EscrowConfig::default(), &scenario)
    }

    #[test]
    fn settlement_scenario_runs_to_completion() {
        let report = run(SCENARIO_A).unwrap();
        let names: Vec<&str> = report
            .lines
            .iter()
            .filter_map(|l| l.body.get("event").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                "escrow_created",
                "deposit_received",
                "deposit_received",
                "deposits_locked",
                "withdrawn",
                "withdrawn",
                "settled",
            ]
        );
        let last = report.lines.last().unwrap();
        assert_eq!(last.body["expected_error"], "insufficient_balance");
        assert_eq!(last.step, 7);

        let snap = &report.snapshots["deal"];
        assert_eq!(snap.accounts.total_held, Amount::ZERO);
        assert!(report.conserved);
        assert_eq!(report.accounts[&Address::new("alice").unwrap()], Amount::new(500));
    }

    #[test]
    fn create_uses_configured_defaults() {
        let yaml = r#"
start: "2026-01-01T00:00:00Z"
steps:
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol }
"#;
        let config = EscrowConfig {
            default_deadline_secs: 60,
            default_grace_secs: Some(30),
            ..EscrowConfig::default()
        };
        let report = ScenarioRunner::run(config, &Scenario::from_yaml(yaml).unwrap()).unwrap();
        let snap = &report.snapshots["e"];
        assert_eq!(snap.deadline, Timestamp::parse("2026-01-01T00:01:00Z").unwrap());
        assert_eq!(
            snap.grace_period_end,
            Some(Timestamp::parse("2026-01-01T00:00:30Z").unwrap())
        );
    }

    #[test]
    fn start_time_follows_timestamp_rules() {
        let yaml = r#"
start: "2026-01-01T00:00:00.750Z"
steps:
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol, deadline_secs: 60 }
"#;
        let report = run(yaml).unwrap();
        let snap = &report.snapshots["e"];
        assert_eq!(snap.created_at, Timestamp::parse("2026-01-01T00:00:00Z").unwrap());
        assert_eq!(snap.deadline.epoch_secs() - snap.created_at.epoch_secs(), 60);

        let offset = "start: \"2026-01-01T00:00:00+00:00\"\nsteps: []\n";
        assert!(matches!(
            Scenario::from_yaml(offset),
            Err(ScenarioError::Parse(_))
        ));
    }

    #[test]
    fn clock_advances_between_steps() {
        let yaml = r#"
start: "2026-01-01T00:00:00Z"
steps:
  - { op: fund, account: alice, amount: 10 }
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol, deadline_secs: 100 }
  - { op: deposit, escrow: e, caller: alice, amount: 10 }
  - { op: withdraw-after-deadline, escrow: e, caller: alice, expect_error: deadline_not_reached }
  - { op: advance, secs: 100 }
  - { op: withdraw-after-deadline, escrow: e, caller: alice }
"#;
        let report = run(yaml).unwrap();
        assert_eq!(report.accounts[&Address::new("alice").unwrap()], Amount::new(10));
        assert_eq!(report.lines.last().unwrap().body["event"], "withdrawn");
    }

    #[test]
    fn rejected_payout_is_reported_and_rolled_back() {
        let yaml = r#"
start: "2026-01-01T00:00:00Z"
steps:
  - { op: fund, account: alice, amount: 10 }
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol, grace_secs: 50 }
  - { op: deposit, escrow: e, caller: alice, amount: 10 }
  - { op: reject-payouts, account: alice }
  - { op: grace-withdraw, escrow: e, caller: bob, expect_error: transfer_failure }
  - { op: reject-payouts, account: alice, reject: false }
  - { op: grace-withdraw, escrow: e, caller: bob }
"#;
        let report = run(yaml).unwrap();
        assert_eq!(report.snapshots["e"].accounts.total_held, Amount::ZERO);
        assert!(report.conserved);
    }

    #[test]
    fn unexpected_failure_stops_run() {
        let yaml = r#"
steps:
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol }
  - { op: lock, escrow: e, caller: alice }
"#;
        let err = run(yaml).unwrap_err();
        assert!(matches!(err, ScenarioError::StepFailed { step: 1, .. }));
    }

    #[test]
    fn expected_failure_that_succeeds_stops_run() {
        let yaml = r#"
steps:
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol }
  - { op: lock, escrow: e, caller: carol, expect_error: unauthorized }
"#;
        assert!(matches!(
            run(yaml).unwrap_err(),
            ScenarioError::ExpectedFailure { step: 1, .. }
        ));
    }

    #[test]
    fn wrong_error_kind_stops_run() {
        let yaml = r#"
steps:
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol }
  - { op: lock, escrow: e, caller: bob, expect_error: invalid_state }
"#;
        assert!(matches!(
            run(yaml).unwrap_err(),
            ScenarioError::WrongError {
                actual: LedgerErrorKind::Unauthorized,
                ..
            }
        ));
    }

    #[test]
    fn script_errors() {
        let unknown = "steps:\n  - { op: lock, escrow: nope, caller: carol }\n";
        assert!(matches!(
            run(unknown).unwrap_err(),
            ScenarioError::UnknownEscrow { .. }
        ));
        let duplicate = r#"
steps:
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol }
  - { op: create, escrow: e, caller: alice, beneficiary: bob, arbiter: carol }
"#;
        assert!(matches!(
            run(duplicate).unwrap_err(),
            ScenarioError::DuplicateEscrow { .. }
        ));
        let bad_kind =
            "steps:\n  - { op: create, escrow: e, caller: a, beneficiary: b, arbiter: c, expect_error: oops }\n";
        assert!(matches!(
            run(bad_kind).unwrap_err(),
            ScenarioError::UnknownErrorKind { .. }
        ));
        assert!(matches!(
            Scenario::from_yaml("steps:\n  - { op: teleport }\n").unwrap_err(),
            ScenarioError::Parse(_)
        ));
    }

    #[test]
    fn scenario_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yaml");
        std::fs::write(&path, SCENARIO_A).unwrap();
        let scenario = Scenario::from_file(&path).unwrap();
        assert_eq!(scenario.steps.len(), 8);
        assert!(matches!(
            Scenario::from_file(&dir.path().join("missing.yaml")).unwrap_err(),
            ScenarioError::Io { .. }
        ));
    }
}
