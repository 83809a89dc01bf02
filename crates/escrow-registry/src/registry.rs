//! # Escrow Registry
//!
//! Append-only list of ledger handles. Every ledger created here shares the
//! registry's clock and value rail. Reads clone the handles out under a read
//! lock; creation takes the write lock only to append.

use std::sync::Arc;

use chrono::Duration;
use escrow_core::{Address, Clock, LedgerId};
use escrow_ledger::{EscrowLedger, LedgerTerms, SharedLedger, SharedRail};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A notification emitted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A new ledger was created.
    EscrowCreated {
        /// The creating caller, who is the ledger's depositor.
        depositor: Address,
        /// The new ledger.
        ledger: LedgerId,
    },
}

/// Creates escrow ledgers and tracks them in creation order.
#[derive(Debug)]
pub struct EscrowRegistry {
    escrows: RwLock<Vec<SharedLedger>>,
    events: RwLock<Vec<RegistryEvent>>,
    clock: Arc<dyn Clock>,
    rail: SharedRail,
}

impl EscrowRegistry {
    /// Create an empty registry whose ledgers use `clock` and `rail`.
    pub fn new(clock: Arc<dyn Clock>, rail: SharedRail) -> Self {
        Self {
            escrows: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
            clock,
            rail,
        }
    }

    /// Create a ledger with `caller` as depositor and append it.
    ///
    /// The deadline (and grace window end, if any) are measured from the
    /// registry clock's current reading.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Ledger`] if the ledger cannot be constructed.
    /// Nothing is appended in that case.
    pub fn create_escrow(
        &self,
        caller: &Address,
        beneficiary: &Address,
        arbiter: &Address,
        deadline_duration: Duration,
        grace_period: Option<Duration>,
    ) -> Result<SharedLedger, RegistryError> {
        let terms = LedgerTerms {
            depositor: caller.clone(),
            beneficiary: beneficiary.clone(),
            arbiter: arbiter.clone(),
            deadline_duration,
            grace_period,
        };
        let ledger = EscrowLedger::create(terms, self.clock.now())?;
        let handle = SharedLedger::new(ledger, Arc::clone(&self.clock), Arc::clone(&self.rail));

        // Both logs are appended under the escrow write lock so the event
        // order always matches the list order.
        let mut escrows = self.escrows.write();
        escrows.push(handle.clone());
        self.events.write().push(RegistryEvent::EscrowCreated {
            depositor: caller.clone(),
            ledger: handle.id(),
        });
        tracing::info!(
            ledger_id = %handle.id(),
            depositor = %caller,
            index = escrows.len() - 1,
            "escrow created"
        );
        Ok(handle)
    }

    /// Every ledger created so far, in creation order.
    pub fn all_escrows(&self) -> Vec<SharedLedger> {
        self.escrows.read().clone()
    }

    /// The ledger created `index`-th, starting at 0.
    pub fn get(&self, index: usize) -> Option<SharedLedger> {
        self.escrows.read().get(index).cloned()
    }

    /// Look up a ledger by identifier.
    pub fn find(&self, id: LedgerId) -> Option<SharedLedger> {
        self.escrows.read().iter().find(|l| l.id() == id).cloned()
    }

    /// Number of ledgers created.
    pub fn len(&self) -> usize {
        self.escrows.read().len()
    }

    /// Whether no ledger has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry's notification log.
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.events.read().clone()
    }

    /// The clock shared with every ledger.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The value rail shared with every ledger.
    pub fn rail(&self) -> &SharedRail {
        &self.rail
    }
}
