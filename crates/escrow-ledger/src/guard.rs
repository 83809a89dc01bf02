//! # Authorization Guards
//!
//! Role checks are pure identity equality against the three addresses fixed
//! at construction. Every mutating ledger operation calls one of the guards
//! here before looking at any other state, so an unauthorized caller learns
//! nothing beyond the rejection itself.
//!
//! The three roles are not required to be distinct. One address may hold
//! several roles and passes every guard any of its roles satisfies.

use escrow_core::{Address, LedgerId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A role in an escrow agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The party who opened the escrow.
    Depositor,
    /// The counterparty.
    Beneficiary,
    /// The trusted third party who locks and settles.
    Arbiter,
}

impl Role {
    /// The canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Depositor => "depositor",
            Self::Beneficiary => "beneficiary",
            Self::Arbiter => "arbiter",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three addresses of an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parties {
    /// Depositor address.
    pub depositor: Address,
    /// Beneficiary address.
    pub beneficiary: Address,
    /// Arbiter address.
    pub arbiter: Address,
}

/// Which principal balance slots a caller owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrincipalRoles {
    /// Caller is the depositor.
    pub depositor: bool,
    /// Caller is the beneficiary.
    pub beneficiary: bool,
}

impl PrincipalRoles {
    /// Whether the caller holds either principal role.
    pub fn any(&self) -> bool {
        self.depositor || self.beneficiary
    }
}

impl Parties {
    /// The principal roles `who` holds.
    pub fn principal_roles(&self, who: &Address) -> PrincipalRoles {
        PrincipalRoles {
            depositor: *who == self.depositor,
            beneficiary: *who == self.beneficiary,
        }
    }

    /// Whether `who` is the arbiter.
    pub fn is_arbiter(&self, who: &Address) -> bool {
        *who == self.arbiter
    }

    /// The address holding a role.
    pub fn address_of(&self, role: Role) -> &Address {
        match role {
            Role::Depositor => &self.depositor,
            Role::Beneficiary => &self.beneficiary,
            Role::Arbiter => &self.arbiter,
        }
    }
}

/// Reject any caller other than the arbiter.
pub fn require_arbiter(
    ledger_id: LedgerId,
    parties: &Parties,
    caller: &Address,
    operation: &'static str,
) -> Result<(), LedgerError> {
    if parties.is_arbiter(caller) {
        return Ok(());
    }
    tracing::debug!(%ledger_id, %caller, operation, "rejected: caller is not the arbiter");
    Err(LedgerError::Unauthorized {
        ledger_id: ledger_id.to_string(),
        caller: caller.to_string(),
        operation,
        required: "arbiter",
    })
}

/// Reject any caller that is neither depositor nor beneficiary.
///
/// Returns the principal roles the caller holds.
pub fn require_principal(
    ledger_id: LedgerId,
    parties: &Parties,
    caller: &Address,
    operation: &'static str,
) -> Result<PrincipalRoles, LedgerError> {
    let roles = parties.principal_roles(caller);
    if roles.any() {
        return Ok(roles);
    }
    tracing::debug!(%ledger_id, %caller, operation, "rejected: caller is not a principal");
    Err(LedgerError::Unauthorized {
        ledger_id: ledger_id.to_string(),
        caller: caller.to_string(),
        operation,
        required: "depositor or beneficiary",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerErrorKind;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn parties() -> Parties {
        Parties {
            depositor: addr("alice"),
            beneficiary: addr("bob"),
            arbiter: addr("carol"),
        }
    }

    #[test]
    fn arbiter_guard() {
        let id = LedgerId::new();
        assert!(require_arbiter(id, &parties(), &addr("carol"), "lock").is_ok());
        let err = require_arbiter(id, &parties(), &addr("alice"), "lock").unwrap_err();
        assert_eq!(err.kind(), LedgerErrorKind::Unauthorized);
    }

    #[test]
    fn principal_guard() {
        let id = LedgerId::new();
        let roles = require_principal(id, &parties(), &addr("bob"), "deposit").unwrap();
        assert!(roles.beneficiary && !roles.depositor);
        let err = require_principal(id, &parties(), &addr("carol"), "deposit").unwrap_err();
        assert_eq!(err.kind(), LedgerErrorKind::Unauthorized);
        assert!(require_principal(id, &parties(), &addr("mallory"), "deposit").is_err());
    }

    #[test]
    fn overlapping_roles_are_permitted() {
        let same = Parties {
            depositor: addr("alice"),
            beneficiary: addr("alice"),
            arbiter: addr("alice"),
        };
        let id = LedgerId::new();
        let roles = require_principal(id, &same, &addr("alice"), "withdraw").unwrap();
        assert!(roles.depositor && roles.beneficiary);
        assert!(require_arbiter(id, &same, &addr("alice"), "settle").is_ok());
    }

    #[test]
    fn address_of_each_role() {
        let p = parties();
        assert_eq!(p.address_of(Role::Depositor).as_str(), "alice");
        assert_eq!(p.address_of(Role::Beneficiary).as_str(), "bob");
        assert_eq!(p.address_of(Role::Arbiter).as_str(), "carol");
    }
}
