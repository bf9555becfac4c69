// src/borrow_e2e/sim/lending.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use candid::{Nat, Principal};
use icrc2_types::{Account, BorrowResult, TransferArg, TransferFromArgs};
use num_bigint::BigUint;
use num_traits::Zero;

use super::{CallLog, SimLedger};
use crate::lending::{LendingService, LoanId};
use crate::E2eError;

/// One open or closed loan
#[derive(Clone, Debug)]
struct Loan {
    owner: Principal,
    collateral: Nat,
    borrowed: Nat,
    open: bool,
}

#[derive(Default)]
struct LendingState {
    loans: HashMap<String, Loan>,
    next_id: u64,
}

/// Stable value lent against collateral (collateral must stay at 1.5x borrowed)
fn borrowable(collateral: &BigUint) -> BigUint {
    (collateral * 2u32) / 3u32
}

/// In-memory borrow canister moving funds on two [`SimLedger`]s.
#[derive(Clone)]
pub struct SimLending {
    canister: Principal,
    collateral: SimLedger,
    stable: SimLedger,
    state: Arc<Mutex<LendingState>>,
    log: CallLog,
}

impl SimLending {
    pub fn new(canister: Principal, collateral: SimLedger, stable: SimLedger, log: CallLog) -> Self {
        Self {
            canister,
            collateral,
            stable,
            state: Arc::default(),
            log,
        }
    }

    pub fn canister_id(&self) -> Principal {
        self.canister
    }

    pub fn as_caller(&self, caller: Principal) -> SimLendingClient {
        SimLendingClient {
            lending: self.clone(),
            caller,
        }
    }

    pub fn open_loans(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loans.values().filter(|loan| loan.open).count()
    }

    /// Pull `amount` of collateral from `caller` and lend stable value against it.
    pub fn deposit(&self, caller: Principal, amount: Nat) -> BorrowResult {
        if amount.0.is_zero() {
            return BorrowResult::Err("deposit amount must be positive".to_string());
        }

        let pull = TransferFromArgs::new(Account::new(caller), Account::new(self.canister), amount.clone());
        if let Err(err) = self.collateral.transfer_from(self.canister, pull) {
            tracing::debug!(?err, "collateral transfer failed");
            return BorrowResult::Err(format!("collateral transfer failed: {err:?}"));
        }

        let borrowed = Nat::from(borrowable(&amount.0));
        self.stable.mint(&Account::new(caller), &borrowed);

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = format!("loan-{}", state.next_id);
        state.next_id += 1;
        state.loans.insert(
            id.clone(),
            Loan {
                owner: caller,
                collateral: amount,
                borrowed,
                open: true,
            },
        );
        BorrowResult::Ok(id)
    }

    /// Take the borrowed stable value back from `caller`, then release the collateral.
    ///
    /// The release fee is paid out of the collateral, so the caller gets back
    /// `collateral - fee`. Nothing moves unless the release can go through.
    pub fn withdraw(&self, caller: Principal, loan_id: &str) -> BorrowResult {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let loan = match state.loans.get_mut(loan_id) {
            Some(loan) => loan,
            None => return BorrowResult::Err(format!("loan {loan_id} not found")),
        };
        if loan.owner != caller {
            return BorrowResult::Err(format!("loan {loan_id} belongs to another account"));
        }
        if !loan.open {
            return BorrowResult::Err(format!("loan {loan_id} is already closed"));
        }

        let canister = Account::new(self.canister);
        let release_fee = self.collateral.fee();
        if loan.collateral <= release_fee {
            return BorrowResult::Err(format!(
                "collateral {} does not cover the release fee {release_fee}",
                loan.collateral
            ));
        }
        let held = self.collateral.balance_of(&canister);
        if held < loan.collateral {
            return BorrowResult::Err(format!(
                "canister holds {held} collateral, loan needs {}",
                loan.collateral
            ));
        }

        let repay = TransferFromArgs::new(
            Account::new(caller),
            canister.clone(),
            loan.borrowed.clone(),
        );
        if let Err(err) = self.stable.transfer_from(self.canister, repay) {
            return BorrowResult::Err(format!("repayment failed: {err:?}"));
        }

        let released = Nat::from(&loan.collateral.0 - &release_fee.0);
        let release = TransferArg::new(Account::new(caller), released);
        if let Err(err) = self.collateral.transfer(self.canister, release) {
            self.refund(caller, &loan.borrowed);
            return BorrowResult::Err(format!("collateral release failed: {err:?}"));
        }

        loan.open = false;
        BorrowResult::Ok(loan_id.to_string())
    }

    /// Hand a repayment back, less the stable ledger's fee.
    fn refund(&self, caller: Principal, repaid: &Nat) {
        let fee = self.stable.fee();
        if *repaid <= fee {
            return;
        }
        let refund = TransferArg::new(Account::new(caller), Nat::from(&repaid.0 - &fee.0));
        if let Err(err) = self.stable.transfer(self.canister, refund) {
            tracing::warn!(?err, "repayment refund failed");
        }
    }
}

#[derive(Clone)]
pub struct SimLendingClient {
    lending: SimLending,
    caller: Principal,
}

#[async_trait]
impl LendingService for SimLendingClient {
    async fn deposit(&self, amount: Nat) -> Result<BorrowResult, E2eError> {
        self.lending.log.record("borrow.deposit");
        Ok(self.lending.deposit(self.caller, amount))
    }

    async fn withdraw(&self, loan_id: &LoanId) -> Result<BorrowResult, E2eError> {
        self.lending.log.record("borrow.withdraw");
        Ok(self.lending.withdraw(self.caller, loan_id.as_str()))
    }
}
