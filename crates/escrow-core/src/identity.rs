//! # Identity Newtypes
//!
//! Identifiers for the parties of an escrow agreement and for the ledgers
//! themselves. An [`Address`] names a principal (depositor, beneficiary, or
//! arbiter); a [`LedgerId`] is the reference handed out when a ledger is
//! created.
//!
//! ## Validation
//!
//! [`Address`] validates its format at construction. Role checks elsewhere
//! in the stack are plain equality on this type, so two addresses are the
//! same principal exactly when their strings are equal. [`LedgerId`] is
//! UUID-based and always valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

const MAX_ADDRESS_LEN: usize = 128;

/// The address of a principal taking part in an escrow agreement.
///
/// # Validation
///
/// - 1 to 128 characters
/// - ASCII alphanumerics plus `_`, `.`, `:` and `-`
///
/// This admits plain account names (`alice`), DIDs (`did:key:z6Mk...`) and
/// hex account strings (`0x5aeb...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Create an address from a string, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] if the string is empty,
    /// too long, or contains a disallowed character.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let valid_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-');
        if s.is_empty() || s.len() > MAX_ADDRESS_LEN || !s.chars().all(valid_char) {
            return Err(ValidationError::InvalidAddress(s));
        }
        Ok(Self(s))
    }

    /// Access the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::str::FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unique reference to one escrow ledger instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerId(Uuid);

impl LedgerId {
    /// Create a new random ledger identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ledger identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse a ledger identifier, accepting either a bare UUID or the
    /// `ledger:` prefixed display form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidLedgerId`] if the remainder is not
    /// a UUID.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let raw = s.strip_prefix("ledger:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| ValidationError::InvalidLedgerId(s.to_string()))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LedgerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ledger:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_accepts_common_forms() {
        assert!(Address::new("alice").is_ok());
        assert!(Address::new("did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK").is_ok());
        assert!(Address::new("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_ok());
        assert!(Address::new("escrow.arbiter-01").is_ok());
    }

    #[test]
    fn address_rejects_empty() {
        assert_eq!(
            Address::new(""),
            Err(ValidationError::InvalidAddress(String::new()))
        );
    }

    #[test]
    fn address_rejects_whitespace_and_symbols() {
        assert!(Address::new("alice bob").is_err());
        assert!(Address::new("alice/bob").is_err());
        assert!(Address::new("al\u{00e9}").is_err());
    }

    #[test]
    fn address_rejects_overlong() {
        assert!(Address::new("a".repeat(MAX_ADDRESS_LEN)).is_ok());
        assert!(Address::new("a".repeat(MAX_ADDRESS_LEN + 1)).is_err());
    }

    #[test]
    fn address_equality_is_exact() {
        let a = Address::new("alice").unwrap();
        assert_eq!(a, Address::new("alice").unwrap());
        assert_ne!(a, Address::new("Alice").unwrap());
    }

    #[test]
    fn address_serde_validates() {
        let a: Address = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(a.as_str(), "bob");
        assert!(serde_json::from_str::<Address>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"bob\"");
    }

    #[test]
    fn address_from_str() {
        let a: Address = "carol".parse().unwrap();
        assert_eq!(a.to_string(), "carol");
    }

    #[test]
    fn ledger_id_unique() {
        assert_ne!(LedgerId::new(), LedgerId::new());
    }

    #[test]
    fn ledger_id_display_and_parse() {
        let id = LedgerId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("ledger:"));
        assert_eq!(LedgerId::parse(&shown).unwrap(), id);
        assert_eq!(LedgerId::parse(&id.as_uuid().to_string()).unwrap(), id);
        assert!(LedgerId::parse("ledger:nope").is_err());
    }
}
