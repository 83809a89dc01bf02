//! # Value Transfer
//!
//! The seam between a ledger's internal accounting and the rail that
//! actually moves native value. A ledger never touches value directly: it
//! asks a [`ValueTransfer`] to collect an attached deposit or to disburse a
//! batch of payouts, and treats any error as grounds to abort the call.
//!
//! ## Atomicity Contract
//!
//! [`ValueTransfer::disburse`] must apply a batch all-or-nothing. If it
//! returns an error, no payout in the batch may have been made. The ledger
//! relies on this to roll back a multi-party settlement without ever
//! exposing a partial payout.

use std::collections::{BTreeMap, BTreeSet};

use escrow_core::{Address, Amount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single outgoing transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Recipient.
    pub to: Address,
    /// Amount to send.
    pub amount: Amount,
}

/// Errors reported by a value-transfer rail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The recipient refused or could not accept the transfer.
    #[error("recipient {to} rejected the transfer")]
    RecipientRejected {
        /// The refusing recipient.
        to: Address,
    },

    /// The payer does not have enough value available.
    #[error("{from} has {available} available, {requested} requested")]
    InsufficientFunds {
        /// The payer (an account, or `custody` for ledger-held value).
        from: String,
        /// Amount requested.
        requested: Amount,
        /// Amount available.
        available: Amount,
    },

    /// A rail-side balance would overflow.
    #[error("rail balance overflow")]
    Overflow,

    /// The rail is unavailable.
    #[error("transfer rail unavailable: {0}")]
    Unavailable(String),
}

/// Moves native value in and out of escrow custody.
pub trait ValueTransfer: Send + std::fmt::Debug {
    /// Take `amount` from `from` into custody.
    fn collect(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError>;

    /// Pay every payout in `payouts` out of custody, all-or-nothing.
    fn disburse(&mut self, payouts: &[Payout]) -> Result<(), TransferError>;
}

/// In-process rail keeping account balances in memory.
///
/// Value is conserved across the rail: the sum of all account balances plus
/// [`custody`](InMemoryRail::custody) only changes through
/// [`fund`](InMemoryRail::fund).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryRail {
    accounts: BTreeMap<Address, Amount>,
    custody: Amount,
    rejecting: BTreeSet<Address>,
}

impl InMemoryRail {
    /// Create an empty rail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account with externally minted value.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Overflow`] if the balance would overflow.
    pub fn fund(&mut self, account: &Address, amount: Amount) -> Result<(), TransferError> {
        let current = self.balance_of(account);
        let next = current.checked_add(amount).ok_or(TransferError::Overflow)?;
        self.accounts.insert(account.clone(), next);
        Ok(())
    }

    /// Spendable balance of an account.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.accounts.get(account).copied().unwrap_or(Amount::ZERO)
    }

    /// Value currently held in escrow custody.
    pub fn custody(&self) -> Amount {
        self.custody
    }

    /// Make every future payout to `account` fail.
    pub fn reject_payouts_to(&mut self, account: &Address) {
        self.rejecting.insert(account.clone());
    }

    /// Accept payouts to `account` again.
    pub fn accept_payouts_to(&mut self, account: &Address) {
        self.rejecting.remove(account);
    }
}

impl ValueTransfer for InMemoryRail {
    fn collect(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError> {
        let available = self.balance_of(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| TransferError::InsufficientFunds {
                from: from.to_string(),
                requested: amount,
                available,
            })?;
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        self.accounts.insert(from.clone(), remaining);
        self.custody = custody;
        Ok(())
    }

    fn disburse(&mut self, payouts: &[Payout]) -> Result<(), TransferError> {
        // Validate the whole batch against a scratch copy, then commit.
        let mut custody = self.custody;
        let mut credited: BTreeMap<&Address, Amount> = BTreeMap::new();
        for payout in payouts {
            if self.rejecting.contains(&payout.to) {
                return Err(TransferError::RecipientRejected {
                    to: payout.to.clone(),
                });
            }
            custody = custody
                .checked_sub(payout.amount)
                .ok_or_else(|| TransferError::InsufficientFunds {
                    from: "custody".to_string(),
                    requested: payout.amount,
                    available: custody,
                })?;
            let entry = credited
                .entry(&payout.to)
                .or_insert_with(|| self.balance_of(&payout.to));
            *entry = entry
                .checked_add(payout.amount)
                .ok_or(TransferError::Overflow)?;
        }

        let updates: Vec<(Address, Amount)> = credited
            .into_iter()
            .map(|(to, balance)| (to.clone(), balance))
            .collect();
        self.accounts.extend(updates);
        self.custody = custody;
        Ok(())
    }
}
