// src/borrow_e2e/lib.rs
//
// End-to-end harness: approve -> deposit -> approve -> withdraw -> verify
// against the borrow canister and its collateral and stable ICRC-2 ledgers.

pub mod agent;
pub mod config;
mod error;
pub mod identity;
pub mod ledger;
pub mod lending;
pub mod scenario;
pub mod sim;

pub use error::E2eError;
pub use ledger::{Icrc2Ledger, LedgerProxy};
pub use lending::{LendingProxy, LendingService, LoanId};
pub use scenario::{setup, Scenario, ScenarioParams, ScenarioReport, Services};
