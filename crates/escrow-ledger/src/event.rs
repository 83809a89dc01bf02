//! # Ledger Notifications
//!
//! One notification per successful state transition. Operations that
//! succeed without changing state (an idempotent lock, a withdrawal of a
//! zero balance) emit nothing.

use escrow_core::{Address, Amount, LedgerId, Timestamp};
use serde::{Deserialize, Serialize};

/// A notification emitted by an escrow ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A party deposited value. `running_total` is that party's recorded
    /// balance after the deposit.
    DepositReceived {
        /// The depositing party.
        depositor: Address,
        /// Amount deposited in this call.
        amount: Amount,
        /// The party's balance after the deposit.
        running_total: Amount,
    },
    /// The arbiter locked deposits.
    DepositsLocked,
    /// The arbiter reopened deposits.
    DepositsUnlocked,
    /// Value was paid out of the ledger.
    Withdrawn {
        /// Recipient.
        to: Address,
        /// Amount paid.
        amount: Amount,
    },
    /// The arbiter settled the ledger.
    Settled {
        /// Paid to the depositor.
        amount_to_depositor: Amount,
        /// Paid to the beneficiary.
        amount_to_beneficiary: Amount,
    },
    /// A party triggered the mutual refund during the grace window.
    GracePeriodWithdrawal {
        /// Refunded to the depositor.
        amount_to_depositor: Amount,
        /// Refunded to the beneficiary.
        amount_to_beneficiary: Amount,
    },
}

impl LedgerEvent {
    /// The canonical event name, as used in the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DepositReceived { .. } => "deposit_received",
            Self::DepositsLocked => "deposits_locked",
            Self::DepositsUnlocked => "deposits_unlocked",
            Self::Withdrawn { .. } => "withdrawn",
            Self::Settled { .. } => "settled",
            Self::GracePeriodWithdrawal { .. } => "grace_period_withdrawal",
        }
    }
}

/// A notification as recorded in a ledger's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the ledger's log, starting at 0.
    pub sequence: u64,
    /// The emitting ledger.
    pub ledger_id: LedgerId,
    /// Clock reading of the call that emitted it.
    pub at: Timestamp,
    /// The notification itself.
    #[serde(flatten)]
    pub event: LedgerEvent,
}
