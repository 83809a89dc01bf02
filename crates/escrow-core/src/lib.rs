#![deny(missing_docs)]

//! # escrow-core — Foundational Types for the Escrow Ledger Stack
//!
//! This crate defines the primitives every other crate in the workspace
//! depends on. It has no internal crate dependencies, only `serde`,
//! `thiserror`, `chrono`, `uuid`, and `parking_lot` from the ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A party [`Address`] and a
//!    [`LedgerId`] are distinct types. Addresses are validated at
//!    construction; ledger identifiers are valid by construction.
//!
//! 2. **[`Amount`] is unsigned and checked.** Balances can never go
//!    negative, and every arithmetic step returns `Option` so callers must
//!    decide what overflow means for them. Nothing wraps silently.
//!
//! 3. **UTC-only [`Timestamp`]s.** Deadlines and grace windows are absolute
//!    UTC instants with seconds precision.
//!
//! 4. **Time is an injected dependency.** Every time-gated decision reads a
//!    [`Clock`]. Production code uses [`SystemClock`]; tests and scenario
//!    runs use [`ManualClock`].

pub mod amount;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use amount::Amount;
pub use error::ValidationError;
pub use identity::{Address, LedgerId};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
