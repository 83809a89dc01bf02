//! Registry error types.

use escrow_ledger::LedgerError;
use thiserror::Error;

/// Errors arising from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Ledger construction failed.
    #[error("escrow creation failed: {0}")]
    Ledger(#[from] LedgerError),
}
