//! # Shared Ledger Handle
//!
//! A cloneable, thread-safe handle that pairs one [`EscrowLedger`] with the
//! clock and value rail its calls run against.
//!
//! Each call holds the ledger mutex from precondition checks through the
//! transfer, so two calls on the same ledger never interleave and no
//! re-entrant call can observe the window between accounting commit and
//! transfer. The clock is read once per call, inside the lock. Lock order is
//! always ledger then rail; the rail lock is never held while acquiring a
//! ledger lock.

use std::sync::Arc;

use escrow_core::{Address, Amount, Clock, LedgerId};
use parking_lot::Mutex;

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::ledger::{CallContext, EscrowLedger, LedgerSnapshot};
use crate::transfer::ValueTransfer;

/// A value rail shared by every ledger that pays through it.
pub type SharedRail = Arc<Mutex<dyn ValueTransfer>>;

/// Thread-safe handle to one ledger. Clones refer to the same ledger.
#[derive(Debug, Clone)]
pub struct SharedLedger {
    id: LedgerId,
    inner: Arc<Mutex<EscrowLedger>>,
    clock: Arc<dyn Clock>,
    rail: SharedRail,
}

impl SharedLedger {
    /// Wrap a ledger.
    pub fn new(ledger: EscrowLedger, clock: Arc<dyn Clock>, rail: SharedRail) -> Self {
        Self {
            id: ledger.id(),
            inner: Arc::new(Mutex::new(ledger)),
            clock,
            rail,
        }
    }

    /// The ledger identifier. Does not take the lock.
    pub fn id(&self) -> LedgerId {
        self.id
    }

    /// Whether two handles refer to the same ledger instance.
    pub fn same_ledger(&self, other: &SharedLedger) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Deposit `amount` as `caller`.
    pub fn deposit(
        &self,
        caller: &Address,
        amount: Amount,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let mut ledger = self.inner.lock();
        let ctx = self.context(caller);
        let mut rail = self.rail.lock();
        ledger.deposit(&ctx, amount, &mut *rail)
    }

    /// Lock deposits as `caller`.
    pub fn lock_deposits(&self, caller: &Address) -> Result<Vec<LedgerEvent>, LedgerError> {
        let mut ledger = self.inner.lock();
        let ctx = self.context(caller);
        ledger.lock_deposits(&ctx)
    }

    /// Unlock deposits as `caller`.
    pub fn unlock_deposits(&self, caller: &Address) -> Result<Vec<LedgerEvent>, LedgerError> {
        let mut ledger = self.inner.lock();
        let ctx = self.context(caller);
        ledger.unlock_deposits(&ctx)
    }

    /// Settle as `caller` with the given split.
    pub fn settle(
        &self,
        caller: &Address,
        amount_to_depositor: Amount,
        amount_to_beneficiary: Amount,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let mut ledger = self.inner.lock();
        let ctx = self.context(caller);
        let mut rail = self.rail.lock();
        ledger.settle(&ctx, amount_to_depositor, amount_to_beneficiary, &mut *rail)
    }

    /// Withdraw `caller`'s own balance after the deadline.
    pub fn withdraw_after_deadline(
        &self,
        caller: &Address,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let mut ledger = self.inner.lock();
        let ctx = self.context(caller);
        let mut rail = self.rail.lock();
        ledger.withdraw_after_deadline(&ctx, &mut *rail)
    }

    /// Trigger the grace-window refund as `caller`.
    pub fn grace_period_withdraw(&self, caller: &Address) -> Result<Vec<LedgerEvent>, LedgerError> {
        let mut ledger = self.inner.lock();
        let ctx = self.context(caller);
        let mut rail = self.rail.lock();
        ledger.grace_period_withdraw(&ctx, &mut *rail)
    }

    /// A point-in-time view.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }

    /// Recorded balance of `who`.
    pub fn balance_of(&self, who: &Address) -> Amount {
        self.inner.lock().balance_of(who)
    }

    /// Run a read-only closure against the ledger under its lock.
    pub fn with<R>(&self, f: impl FnOnce(&EscrowLedger) -> R) -> R {
        f(&self.inner.lock())
    }

    fn context(&self, caller: &Address) -> CallContext {
        CallContext::new(caller.clone(), self.clock.now())
    }
}
