//! # Ledger Error Types
//!
//! Structured error hierarchy for escrow ledger operations. Every variant
//! carries the ledger identifier and enough context to diagnose the failure
//! without inspecting logs. Every error means the operation had no effect.

use escrow_core::Amount;
use thiserror::Error;

use crate::guard::Role;
use crate::transfer::TransferError;

/// Errors arising from escrow ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The caller does not hold the role the operation requires.
    #[error("{caller} is not authorized to {operation} on ledger {ledger_id} (requires {required})")]
    Unauthorized {
        /// The ledger identifier.
        ledger_id: String,
        /// The rejected caller.
        caller: String,
        /// The attempted operation.
        operation: &'static str,
        /// The role or roles that would have been accepted.
        required: &'static str,
    },

    /// Lock, unlock, deposit, or settlement preconditions are not met.
    #[error("ledger {ledger_id} cannot {operation}: {reason}")]
    InvalidState {
        /// The ledger identifier.
        ledger_id: String,
        /// The attempted operation.
        operation: &'static str,
        /// Why the current state rejects the operation.
        reason: String,
    },

    /// Deadline withdrawal attempted before the deadline.
    #[error("ledger {ledger_id} deadline {deadline} not reached (now {now})")]
    DeadlineNotReached {
        /// The ledger identifier.
        ledger_id: String,
        /// The deadline (ISO 8601).
        deadline: String,
        /// The clock reading at call time (ISO 8601).
        now: String,
    },

    /// Grace-period withdrawal attempted at or after the deadline.
    #[error("ledger {ledger_id} deadline {deadline} has passed (now {now})")]
    DeadlineExpired {
        /// The ledger identifier.
        ledger_id: String,
        /// The deadline (ISO 8601).
        deadline: String,
        /// The clock reading at call time (ISO 8601).
        now: String,
    },

    /// Grace-period withdrawal attempted after the grace window closed.
    #[error("ledger {ledger_id} grace period ended at {grace_period_end} (now {now})")]
    GracePeriodExpired {
        /// The ledger identifier.
        ledger_id: String,
        /// End of the grace window (ISO 8601).
        grace_period_end: String,
        /// The clock reading at call time (ISO 8601).
        now: String,
    },

    /// A settlement amount exceeds the party's recorded balance.
    #[error("ledger {ledger_id}: {party} balance {available} is less than requested {requested}")]
    InsufficientBalance {
        /// The ledger identifier.
        ledger_id: String,
        /// Whose balance was short.
        party: Role,
        /// The requested amount.
        requested: Amount,
        /// The recorded balance.
        available: Amount,
    },

    /// The value transfer failed; the ledger state was rolled back.
    #[error("ledger {ledger_id} {operation} transfer failed: {source}")]
    TransferFailure {
        /// The ledger identifier.
        ledger_id: String,
        /// The operation whose transfer failed.
        operation: &'static str,
        /// The underlying rail error.
        #[source]
        source: TransferError,
    },

    /// Checked arithmetic overflowed.
    #[error("ledger {ledger_id} arithmetic overflow during {operation}")]
    Overflow {
        /// The ledger identifier.
        ledger_id: String,
        /// The operation that overflowed.
        operation: &'static str,
    },

    /// The amount is not acceptable for the operation (e.g. a zero deposit).
    #[error("ledger {ledger_id} rejected amount: {reason}")]
    InvalidAmount {
        /// The ledger identifier.
        ledger_id: String,
        /// Why the amount was rejected.
        reason: String,
    },

    /// Ledger construction parameters are invalid.
    #[error("invalid configuration for ledger {ledger_id}: {reason}")]
    InvalidConfiguration {
        /// The identifier the ledger would have had.
        ledger_id: String,
        /// Which parameter was rejected, and why.
        reason: String,
    },
}

/// Discriminant of [`LedgerError`] for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerErrorKind {
    /// See [`LedgerError::Unauthorized`].
    Unauthorized,
    /// See [`LedgerError::InvalidState`].
    InvalidState,
    /// See [`LedgerError::DeadlineNotReached`].
    DeadlineNotReached,
    /// See [`LedgerError::DeadlineExpired`].
    DeadlineExpired,
    /// See [`LedgerError::GracePeriodExpired`].
    GracePeriodExpired,
    /// See [`LedgerError::InsufficientBalance`].
    InsufficientBalance,
    /// See [`LedgerError::TransferFailure`].
    TransferFailure,
    /// See [`LedgerError::Overflow`].
    Overflow,
    /// See [`LedgerError::InvalidAmount`].
    InvalidAmount,
    /// See [`LedgerError::InvalidConfiguration`].
    InvalidConfiguration,
}

impl LedgerErrorKind {
    /// The canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidState => "invalid_state",
            Self::DeadlineNotReached => "deadline_not_reached",
            Self::DeadlineExpired => "deadline_expired",
            Self::GracePeriodExpired => "grace_period_expired",
            Self::InsufficientBalance => "insufficient_balance",
            Self::TransferFailure => "transfer_failure",
            Self::Overflow => "overflow",
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidConfiguration => "invalid_configuration",
        }
    }

    /// Parse a canonical snake_case name.
    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "unauthorized" => Self::Unauthorized,
            "invalid_state" => Self::InvalidState,
            "deadline_not_reached" => Self::DeadlineNotReached,
            "deadline_expired" => Self::DeadlineExpired,
            "grace_period_expired" => Self::GracePeriodExpired,
            "insufficient_balance" => Self::InsufficientBalance,
            "transfer_failure" => Self::TransferFailure,
            "overflow" => Self::Overflow,
            "invalid_amount" => Self::InvalidAmount,
            "invalid_configuration" => Self::InvalidConfiguration,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for LedgerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerError {
    /// The error's discriminant.
    pub fn kind(&self) -> LedgerErrorKind {
        match self {
            Self::Unauthorized { .. } => LedgerErrorKind::Unauthorized,
            Self::InvalidState { .. } => LedgerErrorKind::InvalidState,
            Self::DeadlineNotReached { .. } => LedgerErrorKind::DeadlineNotReached,
            Self::DeadlineExpired { .. } => LedgerErrorKind::DeadlineExpired,
            Self::GracePeriodExpired { .. } => LedgerErrorKind::GracePeriodExpired,
            Self::InsufficientBalance { .. } => LedgerErrorKind::InsufficientBalance,
            Self::TransferFailure { .. } => LedgerErrorKind::TransferFailure,
            Self::Overflow { .. } => LedgerErrorKind::Overflow,
            Self::InvalidAmount { .. } => LedgerErrorKind::InvalidAmount,
            Self::InvalidConfiguration { .. } => LedgerErrorKind::InvalidConfiguration,
        }
    }
}
