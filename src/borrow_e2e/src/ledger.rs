// src/borrow_e2e/ledger.rs

use async_trait::async_trait;
use candid::{Nat, Principal};
use icrc2_types::{Account, Allowance, AllowanceArgs, ApproveArgs, ApproveError};

use crate::agent::CanisterProxy;
use crate::E2eError;

/// The slice of an ICRC-2 ledger the scenario talks to.
///
/// The outer `Result` is the call itself; the inner one in `icrc2_approve`
/// is the ledger's own verdict.
#[async_trait]
pub trait Icrc2Ledger: Send + Sync {
    async fn icrc1_balance_of(&self, account: Account) -> Result<Nat, E2eError>;

    async fn icrc2_approve(&self, args: ApproveArgs)
        -> Result<Result<Nat, ApproveError>, E2eError>;

    async fn icrc2_allowance(&self, args: AllowanceArgs) -> Result<Allowance, E2eError>;
}

/// ICRC-2 ledger reached over the network
#[derive(Clone)]
pub struct LedgerProxy {
    canister: CanisterProxy,
}

impl LedgerProxy {
    pub fn new(canister: CanisterProxy) -> Self {
        Self { canister }
    }

    pub fn canister_id(&self) -> Principal {
        self.canister.canister_id()
    }
}

#[async_trait]
impl Icrc2Ledger for LedgerProxy {
    async fn icrc1_balance_of(&self, account: Account) -> Result<Nat, E2eError> {
        self.canister.query("icrc1_balance_of", (account,)).await
    }

    async fn icrc2_approve(
        &self,
        args: ApproveArgs,
    ) -> Result<Result<Nat, ApproveError>, E2eError> {
        self.canister.update("icrc2_approve", (args,)).await
    }

    async fn icrc2_allowance(&self, args: AllowanceArgs) -> Result<Allowance, E2eError> {
        self.canister.query("icrc2_allowance", (args,)).await
    }
}
