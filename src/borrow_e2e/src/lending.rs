// src/borrow_e2e/lending.rs

use std::fmt;

use async_trait::async_trait;
use candid::{Nat, Principal};
use icrc2_types::BorrowResult;

use crate::agent::CanisterProxy;
use crate::E2eError;

/// Loan identifier handed out by `deposit` and consumed by `withdraw`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoanId(String);

impl LoanId {
    /// `None` for an empty identifier.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        (!id.is_empty()).then_some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Borrow canister operations
#[async_trait]
pub trait LendingService: Send + Sync {
    /// Lock `amount` of collateral (pulled through an ICRC-2 allowance) and
    /// open a loan against it.
    async fn deposit(&self, amount: Nat) -> Result<BorrowResult, E2eError>;

    /// Repay the loan and release its collateral.
    async fn withdraw(&self, loan_id: &LoanId) -> Result<BorrowResult, E2eError>;
}

#[derive(Clone)]
pub struct LendingProxy {
    canister: CanisterProxy,
}

impl LendingProxy {
    pub fn new(canister: CanisterProxy) -> Self {
        Self { canister }
    }

    pub fn canister_id(&self) -> Principal {
        self.canister.canister_id()
    }
}

#[async_trait]
impl LendingService for LendingProxy {
    async fn deposit(&self, amount: Nat) -> Result<BorrowResult, E2eError> {
        self.canister.update("deposit", (amount,)).await
    }

    async fn withdraw(&self, loan_id: &LoanId) -> Result<BorrowResult, E2eError> {
        self.canister.update("withdraw", (loan_id.as_str(),)).await
    }
}
