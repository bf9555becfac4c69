// src/borrow_e2e/sim/mod.rs
//
// In-memory stand-ins for the two ledgers and the borrow canister, so the
// scenario can run without a replica.

mod ledger;
mod lending;

use std::sync::{Arc, Mutex, PoisonError};

use candid::{Nat, Principal};
use icrc2_types::Account;

pub use ledger::{SimLedger, SimLedgerClient};
pub use lending::{SimLending, SimLendingClient};

use crate::config::{COLLATERAL_TOKEN, STABLE_TOKEN};
use crate::scenario::Services;

/// Ordered record of every call made through a sim handle, as `"<canister>.<method>"`.
#[derive(Clone, Default, Debug)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Principal of the simulated borrow canister
pub fn lending_canister_id() -> Principal {
    Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 1, 1, 1])
}

/// Two ledgers and a borrow canister sharing one call log.
#[derive(Clone)]
pub struct SimWorld {
    pub collateral: SimLedger,
    pub stable: SimLedger,
    pub lending: SimLending,
    pub log: CallLog,
}

impl SimWorld {
    pub fn new() -> Self {
        let log = CallLog::default();
        let collateral = SimLedger::new(COLLATERAL_TOKEN, log.clone());
        let stable = SimLedger::new(STABLE_TOKEN, log.clone());
        let lending = SimLending::new(
            lending_canister_id(),
            collateral.clone(),
            stable.clone(),
            log.clone(),
        );
        Self {
            collateral,
            stable,
            lending,
            log,
        }
    }

    /// Credit `user` on both ledgers.
    pub fn fund(&self, user: Principal, collateral: u64, stable: u64) {
        self.collateral.mint(&Account::new(user), &Nat::from(collateral));
        self.stable.mint(&Account::new(user), &Nat::from(stable));
    }

    /// Handles bound to `user`, ready for a scenario run.
    pub fn services(
        &self,
        user: Principal,
    ) -> Services<SimLedgerClient, SimLedgerClient, SimLendingClient> {
        Services {
            collateral: self.collateral.as_caller(user),
            stable: self.stable.as_caller(user),
            lending: self.lending.as_caller(user),
            lending_canister: self.lending.canister_id(),
            user,
        }
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
