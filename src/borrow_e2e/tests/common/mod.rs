//! Shared test utilities and helpers
#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use borrow_e2e::sim::{CallLog, SimWorld};
use borrow_e2e::{E2eError, Icrc2Ledger, LendingService, LoanId};
use candid::{Nat, Principal};
use icrc2_types::{Account, Allowance, AllowanceArgs, ApproveArgs, ApproveError, BorrowResult};

pub fn user() -> Principal {
    Principal::from_slice(&[7; 29])
}

/// World where `user()` holds `collateral` and `stable`.
pub fn funded_world(collateral: u64, stable: u64) -> SimWorld {
    let world = SimWorld::new();
    world.fund(user(), collateral, stable);
    world
}

pub fn balance(ledger: &borrow_e2e::sim::SimLedger) -> Nat {
    ledger.balance_of(&Account::new(user()))
}

pub fn position(log: &CallLog, entry: &str) -> Option<usize> {
    log.entries().iter().position(|e| e == entry)
}

/// Ledger that records approvals but never applies them.
pub struct IgnoresApprovals<T>(pub T);

#[async_trait]
impl<T: Icrc2Ledger> Icrc2Ledger for IgnoresApprovals<T> {
    async fn icrc1_balance_of(&self, account: Account) -> Result<Nat, E2eError> {
        self.0.icrc1_balance_of(account).await
    }

    async fn icrc2_approve(
        &self,
        _args: ApproveArgs,
    ) -> Result<Result<Nat, ApproveError>, E2eError> {
        Ok(Ok(Nat::from(0u64)))
    }

    async fn icrc2_allowance(&self, args: AllowanceArgs) -> Result<Allowance, E2eError> {
        self.0.icrc2_allowance(args).await
    }
}

/// Lending service whose deposit takes `delay` before delegating.
pub struct SlowDeposit<T> {
    pub inner: T,
    pub delay: Duration,
}

#[async_trait]
impl<T: LendingService> LendingService for SlowDeposit<T> {
    async fn deposit(&self, amount: Nat) -> Result<BorrowResult, E2eError> {
        tokio::time::sleep(self.delay).await;
        self.inner.deposit(amount).await
    }

    async fn withdraw(&self, loan_id: &LoanId) -> Result<BorrowResult, E2eError> {
        self.inner.withdraw(loan_id).await
    }
}

/// Lending service that opens loans with an empty identifier.
pub struct BlankLoanIds;

#[async_trait]
impl LendingService for BlankLoanIds {
    async fn deposit(&self, _amount: Nat) -> Result<BorrowResult, E2eError> {
        Ok(BorrowResult::Ok(String::new()))
    }

    async fn withdraw(&self, _loan_id: &LoanId) -> Result<BorrowResult, E2eError> {
        Ok(BorrowResult::Err("unreachable".to_string()))
    }
}
