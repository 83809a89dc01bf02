//! # Escrow Ledger
//!
//! One ledger per agreement between a depositor and a beneficiary, with an
//! arbiter who locks deposits and decides the settlement split.
//!
//! ## Lifecycle
//!
//! ```text
//! Active ──lock──▶ Locked ──settle──▶ Settled (terminal)
//!    ▲               │
//!    └────unlock─────┘
//! ```
//!
//! Two fallback paths are not states but predicates on the clock reading
//! supplied with each call:
//!
//! - **Deadline** (`now >= deadline`): each principal may withdraw their own
//!   recorded balance, whatever the lock state.
//! - **Grace window** (`now <= grace_period_end` and `now < deadline`):
//!   either principal may refund both principals in one call.
//!
//! ## Security Invariant
//!
//! Conservation: `total_held == depositor balance + beneficiary balance ==
//! total_deposited - total_paid_out` after every call. Each operation
//! validates every precondition first, then commits its accounting, then
//! performs the external transfer as the last fallible step. A transfer
//! failure restores the accounting saved before the commit, so a failed
//! call is indistinguishable from one that was never made.

use chrono::Duration;
use escrow_core::{Address, Amount, LedgerId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::event::{EventRecord, LedgerEvent};
use crate::guard::{require_arbiter, require_principal, Parties, PrincipalRoles, Role};
use crate::transfer::{Payout, ValueTransfer};

// ── Call context ───────────────────────────────────────────────────────

/// The execution context of one ledger call: who is calling, and what the
/// clock read when the call started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// The calling address.
    pub caller: Address,
    /// Clock reading for every time-gated check in this call.
    pub now: Timestamp,
}

impl CallContext {
    /// Build a call context.
    pub fn new(caller: Address, now: Timestamp) -> Self {
        Self { caller, now }
    }
}

// ── Terms ──────────────────────────────────────────────────────────────

/// Construction parameters of a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTerms {
    /// Depositor address.
    pub depositor: Address,
    /// Beneficiary address.
    pub beneficiary: Address,
    /// Arbiter address.
    pub arbiter: Address,
    /// Time from creation until the deadline.
    pub deadline_duration: Duration,
    /// Time from creation until the grace window closes, if the ledger
    /// offers one.
    pub grace_period: Option<Duration>,
}

// ── Phase ──────────────────────────────────────────────────────────────

/// The explicitly tracked lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerPhase {
    /// Deposits accepted.
    Active,
    /// Deposits rejected; the arbiter may settle.
    Locked,
    /// Settlement completed. Terminal.
    Settled,
}

impl LedgerPhase {
    /// Whether this phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Locked => "LOCKED",
            Self::Settled => "SETTLED",
        }
    }
}

impl std::fmt::Display for LedgerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Accounts ───────────────────────────────────────────────────────────

/// The ledger's accounting. `Copy` so a whole-state snapshot for rollback
/// costs nothing.
///
/// Balances are kept per role slot rather than per address. When one
/// address is both depositor and beneficiary its deposits credit the
/// depositor slot, and its withdrawals drain both slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounts {
    /// Depositor's recorded balance.
    pub depositor: Amount,
    /// Beneficiary's recorded balance.
    pub beneficiary: Amount,
    /// Sum of both balances; the value the ledger holds.
    pub total_held: Amount,
    /// Cumulative deposits, in base units. Wider than [`Amount`] so value
    /// cycling through a ledger never exhausts it.
    pub total_deposited: u128,
    /// Cumulative payouts, in base units.
    pub total_paid_out: u128,
}

impl Accounts {
    /// Recorded balance of a principal slot. The arbiter has none.
    pub fn balance(&self, role: Role) -> Amount {
        match role {
            Role::Depositor => self.depositor,
            Role::Beneficiary => self.beneficiary,
            Role::Arbiter => Amount::ZERO,
        }
    }

    /// Whether both conservation equations hold.
    pub fn is_conserved(&self) -> bool {
        let by_slot = self.depositor.checked_add(self.beneficiary);
        let by_flow = self.total_deposited.checked_sub(self.total_paid_out);
        by_slot == Some(self.total_held) && by_flow == Some(u128::from(self.total_held.units()))
    }

    fn credited(self, role: Role, amount: Amount) -> Option<Self> {
        let mut next = self;
        match role {
            Role::Depositor => next.depositor = next.depositor.checked_add(amount)?,
            Role::Beneficiary => next.beneficiary = next.beneficiary.checked_add(amount)?,
            Role::Arbiter => return None,
        }
        next.total_held = next.total_held.checked_add(amount)?;
        next.total_deposited = next.total_deposited.checked_add(u128::from(amount.units()))?;
        Some(next)
    }

    fn debited(self, role: Role, amount: Amount) -> Option<Self> {
        let mut next = self;
        match role {
            Role::Depositor => next.depositor = next.depositor.checked_sub(amount)?,
            Role::Beneficiary => next.beneficiary = next.beneficiary.checked_sub(amount)?,
            Role::Arbiter => return None,
        }
        next.total_held = next.total_held.checked_sub(amount)?;
        next.total_paid_out = next.total_paid_out.checked_add(u128::from(amount.units()))?;
        Some(next)
    }
}

/// A payout staged against a role slot.
struct StagedPayout {
    role: Role,
    payout: Payout,
}

// ── Ledger ─────────────────────────────────────────────────────────────

/// An arbiter-mediated two-party escrow ledger.
///
/// Created via [`EscrowLedger::create`]. All mutating operations take a
/// [`CallContext`]; operations that move value also take the
/// [`ValueTransfer`] rail to move it through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowLedger {
    id: LedgerId,
    parties: Parties,
    created_at: Timestamp,
    deadline: Timestamp,
    grace_period_end: Option<Timestamp>,
    deposits_locked: bool,
    settled: bool,
    accounts: Accounts,
    events: Vec<EventRecord>,
}

/// A read-only view of a ledger without its event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Ledger identifier.
    pub id: LedgerId,
    /// The three addresses.
    pub parties: Parties,
    /// Lifecycle phase.
    pub phase: LedgerPhase,
    /// Whether deposits are locked.
    pub deposits_locked: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Deadline.
    pub deadline: Timestamp,
    /// End of the grace window, if any.
    pub grace_period_end: Option<Timestamp>,
    /// Accounting.
    pub accounts: Accounts,
}

impl EscrowLedger {
    /// Create a ledger in the [`Active`](LedgerPhase::Active) phase.
    ///
    /// `deadline = now + deadline_duration`, and when a grace period is
    /// given, `grace_period_end = now + grace_period`. The three roles are
    /// not required to be distinct, and a grace window reaching past the
    /// deadline is accepted (the grace path also requires `now < deadline`).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfiguration`] for a negative duration
    /// and [`LedgerError::Overflow`] if a timestamp cannot be represented.
    pub fn create(terms: LedgerTerms, now: Timestamp) -> Result<Self, LedgerError> {
        let id = LedgerId::new();
        if terms.deadline_duration < Duration::zero() {
            return Err(LedgerError::InvalidConfiguration {
                ledger_id: id.to_string(),
                reason: format!(
                    "deadline duration must not be negative, got {}s",
                    terms.deadline_duration.num_seconds()
                ),
            });
        }
        if let Some(grace) = terms.grace_period {
            if grace < Duration::zero() {
                return Err(LedgerError::InvalidConfiguration {
                    ledger_id: id.to_string(),
                    reason: format!(
                        "grace period must not be negative, got {}s",
                        grace.num_seconds()
                    ),
                });
            }
        }

        let overflow = || LedgerError::Overflow {
            ledger_id: id.to_string(),
            operation: "create",
        };
        let deadline = now
            .checked_add(terms.deadline_duration)
            .ok_or_else(overflow)?;
        let grace_period_end = match terms.grace_period {
            Some(grace) => Some(now.checked_add(grace).ok_or_else(overflow)?),
            None => None,
        };

        let ledger = Self {
            id,
            parties: Parties {
                depositor: terms.depositor,
                beneficiary: terms.beneficiary,
                arbiter: terms.arbiter,
            },
            created_at: now,
            deadline,
            grace_period_end,
            deposits_locked: false,
            settled: false,
            accounts: Accounts::default(),
            events: Vec::new(),
        };
        tracing::info!(
            ledger_id = %ledger.id,
            depositor = %ledger.parties.depositor,
            beneficiary = %ledger.parties.beneficiary,
            arbiter = %ledger.parties.arbiter,
            deadline = %ledger.deadline,
            "escrow ledger created"
        );
        Ok(ledger)
    }

    // ── Accessors ──────────────────────────────────────────────────────

    /// Ledger identifier.
    pub fn id(&self) -> LedgerId {
        self.id
    }

    /// The three addresses.
    pub fn parties(&self) -> &Parties {
        &self.parties
    }

    /// Depositor address.
    pub fn depositor(&self) -> &Address {
        &self.parties.depositor
    }

    /// Beneficiary address.
    pub fn beneficiary(&self) -> &Address {
        &self.parties.beneficiary
    }

    /// Arbiter address.
    pub fn arbiter(&self) -> &Address {
        &self.parties.arbiter
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Absolute deadline.
    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// End of the grace window, if the ledger has one.
    pub fn grace_period_end(&self) -> Option<Timestamp> {
        self.grace_period_end
    }

    /// Whether deposits are locked.
    pub fn deposits_locked(&self) -> bool {
        self.deposits_locked
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LedgerPhase {
        if self.settled {
            LedgerPhase::Settled
        } else if self.deposits_locked {
            LedgerPhase::Locked
        } else {
            LedgerPhase::Active
        }
    }

    /// The accounting block.
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Value currently held.
    pub fn total_held(&self) -> Amount {
        self.accounts.total_held
    }

    /// Recorded balance of a principal role.
    pub fn balance(&self, role: Role) -> Amount {
        self.accounts.balance(role)
    }

    /// Total recorded balance of an address over every principal slot it
    /// holds. Zero for the arbiter and for strangers.
    pub fn balance_of(&self, who: &Address) -> Amount {
        let roles = self.parties.principal_roles(who);
        let mut total = Amount::ZERO;
        if roles.depositor {
            total = total.checked_add(self.accounts.depositor).unwrap_or(total);
        }
        if roles.beneficiary {
            total = total.checked_add(self.accounts.beneficiary).unwrap_or(total);
        }
        total
    }

    /// Whether the deadline fallback is open at `now`.
    pub fn is_deadline_reached(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }

    /// Whether the grace-window refund is open at `now`.
    pub fn is_within_grace_period(&self, now: Timestamp) -> bool {
        match self.grace_period_end {
            Some(end) => now <= end && now < self.deadline,
            None => false,
        }
    }

    /// Whether the conservation invariant holds.
    pub fn conservation_holds(&self) -> bool {
        self.accounts.is_conserved()
    }

    /// The append-only event log.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// A read-only view without the event log.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            id: self.id,
            parties: self.parties.clone(),
            phase: self.phase(),
            deposits_locked: self.deposits_locked,
            created_at: self.created_at,
            deadline: self.deadline,
            grace_period_end: self.grace_period_end,
            accounts: self.accounts,
        }
    }

    // ── Operations ─────────────────────────────────────────────────────

    /// Deposit the value attached to the call.
    ///
    /// The caller must be depositor or beneficiary and deposits must be
    /// unlocked. The attached `amount` is collected through `rail` before
    /// the caller's balance is credited; if it cannot be collected nothing
    /// changes.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`], [`LedgerError::InvalidState`] when
    /// locked, [`LedgerError::InvalidAmount`] for zero,
    /// [`LedgerError::Overflow`], [`LedgerError::TransferFailure`].
    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        amount: Amount,
        rail: &mut dyn ValueTransfer,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        const OP: &str = "deposit";
        let roles = require_principal(self.id, &self.parties, &ctx.caller, OP)?;
        if self.deposits_locked {
            return Err(self.invalid_state(OP, "deposits are locked"));
        }
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                ledger_id: self.id.to_string(),
                reason: "deposit amount must be positive".to_string(),
            });
        }
        let slot = if roles.depositor {
            Role::Depositor
        } else {
            Role::Beneficiary
        };
        let next = self
            .accounts
            .credited(slot, amount)
            .ok_or_else(|| self.overflow(OP))?;

        rail.collect(&ctx.caller, amount)
            .map_err(|source| LedgerError::TransferFailure {
                ledger_id: self.id.to_string(),
                operation: OP,
                source,
            })?;
        self.accounts = next;

        let events = vec![LedgerEvent::DepositReceived {
            depositor: ctx.caller.clone(),
            amount,
            running_total: next.balance(slot),
        }];
        self.record(ctx.now, &events);
        Ok(events)
    }

    /// Lock deposits. Arbiter only; locking a locked ledger is a no-op.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`].
    pub fn lock_deposits(&mut self, ctx: &CallContext) -> Result<Vec<LedgerEvent>, LedgerError> {
        require_arbiter(self.id, &self.parties, &ctx.caller, "lock deposits")?;
        if self.deposits_locked {
            return Ok(Vec::new());
        }
        self.deposits_locked = true;
        let events = vec![LedgerEvent::DepositsLocked];
        self.record(ctx.now, &events);
        Ok(events)
    }

    /// Reopen deposits. Arbiter only; unlocking an unlocked ledger is a
    /// no-op. A settled ledger stays locked for good.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`], [`LedgerError::InvalidState`] once
    /// settled.
    pub fn unlock_deposits(&mut self, ctx: &CallContext) -> Result<Vec<LedgerEvent>, LedgerError> {
        const OP: &str = "unlock deposits";
        require_arbiter(self.id, &self.parties, &ctx.caller, OP)?;
        if self.settled {
            return Err(self.invalid_state(OP, "ledger is settled"));
        }
        if !self.deposits_locked {
            return Ok(Vec::new());
        }
        self.deposits_locked = false;
        let events = vec![LedgerEvent::DepositsUnlocked];
        self.record(ctx.now, &events);
        Ok(events)
    }

    /// Settle the ledger with the arbiter's split.
    ///
    /// Requires the arbiter, locked deposits, each amount within the
    /// party's balance, and the two amounts together equal to the whole
    /// held total, so no value is left stranded.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`], [`LedgerError::InvalidState`] when
    /// unlocked, already settled, or the split leaves a residual,
    /// [`LedgerError::InsufficientBalance`], [`LedgerError::Overflow`],
    /// [`LedgerError::TransferFailure`] (rolled back).
    pub fn settle(
        &mut self,
        ctx: &CallContext,
        amount_to_depositor: Amount,
        amount_to_beneficiary: Amount,
        rail: &mut dyn ValueTransfer,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        const OP: &str = "settle";
        require_arbiter(self.id, &self.parties, &ctx.caller, OP)?;
        if !self.deposits_locked {
            return Err(self.invalid_state(OP, "deposits are not locked"));
        }
        for (role, requested) in [
            (Role::Depositor, amount_to_depositor),
            (Role::Beneficiary, amount_to_beneficiary),
        ] {
            let available = self.accounts.balance(role);
            if requested > available {
                return Err(LedgerError::InsufficientBalance {
                    ledger_id: self.id.to_string(),
                    party: role,
                    requested,
                    available,
                });
            }
        }
        let split = amount_to_depositor
            .checked_add(amount_to_beneficiary)
            .ok_or_else(|| self.overflow(OP))?;
        if split != self.accounts.total_held {
            return Err(self.invalid_state(
                OP,
                &format!(
                    "split {split} does not distribute the held total {}",
                    self.accounts.total_held
                ),
            ));
        }
        if self.settled {
            return Err(self.invalid_state(OP, "ledger is already settled"));
        }

        let staged = self.stage(&[
            (Role::Depositor, amount_to_depositor),
            (Role::Beneficiary, amount_to_beneficiary),
        ]);
        let mut events = self.pay_out(OP, &staged, rail)?;
        self.settled = true;
        events.push(LedgerEvent::Settled {
            amount_to_depositor,
            amount_to_beneficiary,
        });
        self.record(ctx.now, &events);
        Ok(events)
    }

    /// Withdraw the caller's own balance once the deadline has passed.
    ///
    /// Available regardless of lock state. A caller with nothing recorded
    /// gets a successful no-op, so repeated calls are harmless.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`], [`LedgerError::DeadlineNotReached`],
    /// [`LedgerError::TransferFailure`] (rolled back).
    pub fn withdraw_after_deadline(
        &mut self,
        ctx: &CallContext,
        rail: &mut dyn ValueTransfer,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        const OP: &str = "withdraw after deadline";
        let roles = require_principal(self.id, &self.parties, &ctx.caller, OP)?;
        if !self.is_deadline_reached(ctx.now) {
            return Err(LedgerError::DeadlineNotReached {
                ledger_id: self.id.to_string(),
                deadline: self.deadline.to_iso8601(),
                now: ctx.now.to_iso8601(),
            });
        }

        let staged = self.stage(&self.own_slots(roles));
        if staged.is_empty() {
            return Ok(Vec::new());
        }
        let events = self.pay_out(OP, &staged, rail)?;
        self.record(ctx.now, &events);
        Ok(events)
    }

    /// Refund both principals their own balances during the grace window.
    ///
    /// Either principal may trigger it alone. Zero balances are skipped;
    /// when both are zero the call is a successful no-op.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`], [`LedgerError::InvalidState`] if the
    /// ledger has no grace window, [`LedgerError::GracePeriodExpired`],
    /// [`LedgerError::DeadlineExpired`],
    /// [`LedgerError::TransferFailure`] (rolled back).
    pub fn grace_period_withdraw(
        &mut self,
        ctx: &CallContext,
        rail: &mut dyn ValueTransfer,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        const OP: &str = "grace period withdraw";
        require_principal(self.id, &self.parties, &ctx.caller, OP)?;
        let Some(grace_period_end) = self.grace_period_end else {
            return Err(self.invalid_state(OP, "ledger has no grace period"));
        };
        if ctx.now > grace_period_end {
            return Err(LedgerError::GracePeriodExpired {
                ledger_id: self.id.to_string(),
                grace_period_end: grace_period_end.to_iso8601(),
                now: ctx.now.to_iso8601(),
            });
        }
        if ctx.now >= self.deadline {
            return Err(LedgerError::DeadlineExpired {
                ledger_id: self.id.to_string(),
                deadline: self.deadline.to_iso8601(),
                now: ctx.now.to_iso8601(),
            });
        }

        let amount_to_depositor = self.accounts.depositor;
        let amount_to_beneficiary = self.accounts.beneficiary;
        let staged = self.stage(&[
            (Role::Depositor, amount_to_depositor),
            (Role::Beneficiary, amount_to_beneficiary),
        ]);
        if staged.is_empty() {
            return Ok(Vec::new());
        }
        let mut events = self.pay_out(OP, &staged, rail)?;
        events.push(LedgerEvent::GracePeriodWithdrawal {
            amount_to_depositor,
            amount_to_beneficiary,
        });
        self.record(ctx.now, &events);
        Ok(events)
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn own_slots(&self, roles: PrincipalRoles) -> Vec<(Role, Amount)> {
        let mut slots = Vec::with_capacity(2);
        if roles.depositor {
            slots.push((Role::Depositor, self.accounts.depositor));
        }
        if roles.beneficiary {
            slots.push((Role::Beneficiary, self.accounts.beneficiary));
        }
        slots
    }

    /// Turn `(role, amount)` pairs into payouts, dropping zero amounts.
    fn stage(&self, amounts: &[(Role, Amount)]) -> Vec<StagedPayout> {
        amounts
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|&(role, amount)| StagedPayout {
                role,
                payout: Payout {
                    to: self.parties.address_of(role).clone(),
                    amount,
                },
            })
            .collect()
    }

    /// Commit the debits for `staged`, then disburse them as one batch.
    ///
    /// On a rail error the accounting is restored to what it was on entry.
    fn pay_out(
        &mut self,
        operation: &'static str,
        staged: &[StagedPayout],
        rail: &mut dyn ValueTransfer,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let saved = self.accounts;
        let mut next = saved;
        for s in staged {
            next = next
                .debited(s.role, s.payout.amount)
                .ok_or_else(|| self.overflow(operation))?;
        }
        self.accounts = next;

        let payouts: Vec<Payout> = staged.iter().map(|s| s.payout.clone()).collect();
        if let Err(source) = rail.disburse(&payouts) {
            self.accounts = saved;
            tracing::warn!(
                ledger_id = %self.id,
                operation,
                error = %source,
                "transfer failed; ledger state rolled back"
            );
            return Err(LedgerError::TransferFailure {
                ledger_id: self.id.to_string(),
                operation,
                source,
            });
        }

        Ok(payouts
            .into_iter()
            .map(|p| LedgerEvent::Withdrawn {
                to: p.to,
                amount: p.amount,
            })
            .collect())
    }

    fn record(&mut self, now: Timestamp, events: &[LedgerEvent]) {
        for event in events {
            tracing::info!(
                ledger_id = %self.id,
                event = event.name(),
                total_held = %self.accounts.total_held,
                "ledger event"
            );
            self.events.push(EventRecord {
                sequence: self.events.len() as u64,
                ledger_id: self.id,
                at: now,
                event: event.clone(),
            });
        }
    }

    fn invalid_state(&self, operation: &'static str, reason: &str) -> LedgerError {
        tracing::debug!(ledger_id = %self.id, operation, reason, phase = %self.phase(), "rejected");
        LedgerError::InvalidState {
            ledger_id: self.id.to_string(),
            operation,
            reason: reason.to_string(),
        }
    }

    fn overflow(&self, operation: &'static str) -> LedgerError {
        LedgerError::Overflow {
            ledger_id: self.id.to_string(),
            operation,
        }
    }
}
