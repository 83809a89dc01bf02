//! # Amounts
//!
//! Native-value amounts in smallest units. Unsigned so that a negative
//! balance is unrepresentable; every arithmetic operation is checked.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A non-negative quantity of the native value unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from a raw count of smallest units.
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Raw count of smallest units.
    pub const fn units(self) -> u64 {
        self.0
    }

    /// Whether the amount is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition. `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction. `None` if `rhs > self`.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Parse an amount from a decimal string of smallest units.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAmount`] for signs, decimals,
    /// empty input, or values above `u64::MAX`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidAmount(s.to_string()));
        }
        s.parse::<u64>()
            .map(Amount)
            .map_err(|_| ValidationError::InvalidAmount(s.to_string()))
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_overflow_is_none() {
        assert_eq!(Amount::new(u64::MAX).checked_add(Amount::new(1)), None);
        assert_eq!(
            Amount::new(40).checked_add(Amount::new(2)),
            Some(Amount::new(42))
        );
    }

    #[test]
    fn checked_sub_underflow_is_none() {
        assert_eq!(Amount::new(1).checked_sub(Amount::new(2)), None);
        assert_eq!(Amount::new(5).checked_sub(Amount::new(5)), Some(Amount::ZERO));
    }

    #[test]
    fn parse_valid() {
        assert_eq!(Amount::parse("0").unwrap(), Amount::ZERO);
        assert_eq!(Amount::parse("12345").unwrap(), Amount::new(12345));
        assert_eq!(
            Amount::parse("18446744073709551615").unwrap(),
            Amount::new(u64::MAX)
        );
    }

    #[test]
    fn parse_invalid() {
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse("-100").is_err());
        assert!(Amount::parse("+100").is_err());
        assert!(Amount::parse("12.34").is_err());
        assert!(Amount::parse("abc").is_err());
        assert!(Amount::parse("18446744073709551616").is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&Amount::new(150)).unwrap();
        assert_eq!(json, "150");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::new(150));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Addition then subtraction of the same amount is the identity
            /// whenever the addition does not overflow.
            #[test]
            fn add_sub_inverse(a in any::<u64>(), b in any::<u64>()) {
                let (a, b) = (Amount::new(a), Amount::new(b));
                if let Some(sum) = a.checked_add(b) {
                    prop_assert_eq!(sum.checked_sub(b), Some(a));
                } else {
                    prop_assert!(a.units().checked_add(b.units()).is_none());
                }
            }

            /// Display output always parses back.
            #[test]
            fn display_parses(n in any::<u64>()) {
                let a = Amount::new(n);
                prop_assert_eq!(Amount::parse(&a.to_string()).unwrap(), a);
            }
        }
    }
}
