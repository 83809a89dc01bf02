//! # Validation Errors
//!
//! Errors raised when constructing domain primitives from untrusted input.
//! Built with `thiserror`; no `Box<dyn Error>`, no `.unwrap()` outside tests.

use thiserror::Error;

/// Domain primitive validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Party address is empty or contains characters outside the allowed set.
    #[error("invalid address: \"{0}\" (expected 1-128 characters of [A-Za-z0-9_.:-])")]
    InvalidAddress(String),

    /// Amount string is not a non-negative integer in smallest units.
    #[error("invalid amount: \"{0}\" (expected a non-negative integer)")]
    InvalidAmount(String),

    /// Timestamp string is not valid UTC ISO 8601.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Ledger identifier is not a valid UUID.
    #[error("invalid ledger id: \"{0}\"")]
    InvalidLedgerId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_address_display() {
        let err = ValidationError::InvalidAddress("bad addr".to_string());
        assert!(format!("{err}").contains("bad addr"));
    }

    #[test]
    fn invalid_timestamp_display_carries_reason() {
        let err = ValidationError::InvalidTimestamp {
            value: "yesterday".to_string(),
            reason: "not RFC 3339".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("yesterday"));
        assert!(msg.contains("not RFC 3339"));
    }
}
