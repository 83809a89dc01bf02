#![deny(missing_docs)]

//! # escrow-ledger — Arbiter-Mediated Two-Party Escrow
//!
//! Implements the escrow ledger and everything a call against it touches:
//!
//! - **Ledger** (`ledger.rs`): The [`EscrowLedger`] state machine with
//!   deposit, lock/unlock, settlement, deadline withdrawal, and grace-window
//!   refund. Holds the conservation invariant and rolls back on transfer
//!   failure.
//!
//! - **Guards** (`guard.rs`): Role checks against the three fixed addresses.
//!
//! - **Transfer** (`transfer.rs`): The [`ValueTransfer`] seam through which
//!   value enters and leaves custody, plus the in-memory [`InMemoryRail`].
//!
//! - **Events** (`event.rs`): Notifications emitted per transition.
//!
//! - **Shared handle** (`shared.rs`): [`SharedLedger`], serializing
//!   concurrent calls on one ledger behind a mutex.
//!
//! ## Crate Policy
//!
//! - Depends on `escrow-core` internally.
//! - Every failed operation leaves the ledger exactly as it was.
//! - Amount arithmetic is checked everywhere; overflow is an error.

pub mod error;
pub mod event;
pub mod guard;
pub mod ledger;
pub mod shared;
pub mod transfer;

pub use error::{LedgerError, LedgerErrorKind};
pub use event::{EventRecord, LedgerEvent};
pub use guard::{Parties, PrincipalRoles, Role};
pub use ledger::{Accounts, CallContext, EscrowLedger, LedgerPhase, LedgerSnapshot, LedgerTerms};
pub use shared::{SharedLedger, SharedRail};
pub use transfer::{InMemoryRail, Payout, TransferError, ValueTransfer};
