#![deny(missing_docs)]

//! # escrow-registry — Escrow Ledger Registry
//!
//! Constructs [`EscrowLedger`](escrow_ledger::EscrowLedger) instances on
//! request and remembers a handle to each, in creation order. The registry
//! never participates in a ledger's lifecycle after creation: all further
//! interaction happens directly against the returned
//! [`SharedLedger`](escrow_ledger::SharedLedger).

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::{EscrowRegistry, RegistryEvent};
