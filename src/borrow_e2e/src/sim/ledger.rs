// src/borrow_e2e/sim/ledger.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use candid::{Nat, Principal};
use icrc2_types::{
    Account, Allowance, AllowanceArgs, ApproveArgs, ApproveError, TransferArg, TransferError,
    TransferFromArgs, TransferFromError,
};
use num_traits::Zero;

use super::CallLog;
use crate::ledger::Icrc2Ledger;
use crate::E2eError;

/// Core ICRC-2 state
#[derive(Default)]
struct LedgerState {
    balances: HashMap<Account, Nat>,
    allowances: HashMap<(Account, Account), Allowance>, // (owner, spender) -> allowance
    fee: Nat,
    now_nanos: u64,
    blocks: u64,
}

impl LedgerState {
    fn balance(&self, account: &Account) -> Nat {
        self.balances.get(account).cloned().unwrap_or_default()
    }

    /// Expired allowances read as zero.
    fn allowance(&self, owner: &Account, spender: &Account) -> Allowance {
        match self.allowances.get(&(owner.clone(), spender.clone())) {
            Some(a) if a.expires_at.map_or(true, |t| t > self.now_nanos) => a.clone(),
            _ => Allowance::default(),
        }
    }

    fn debit(&mut self, account: &Account, amount: &Nat) {
        let balance = self.balance(account);
        self.balances
            .insert(account.clone(), Nat::from(&balance.0 - &amount.0));
    }

    fn credit(&mut self, account: &Account, amount: &Nat) {
        let balance = self.balance(account);
        self.balances
            .insert(account.clone(), Nat::from(&balance.0 + &amount.0));
    }

    fn next_block(&mut self) -> Nat {
        let index = self.blocks;
        self.blocks += 1;
        Nat::from(index)
    }
}

/// In-memory ICRC-2 ledger. Clones share state.
#[derive(Clone)]
pub struct SimLedger {
    name: &'static str,
    state: Arc<Mutex<LedgerState>>,
    log: CallLog,
}

impl SimLedger {
    pub fn new(name: &'static str, log: CallLog) -> Self {
        Self {
            name,
            state: Arc::default(),
            log,
        }
    }

    pub fn with_fee(self, fee: Nat) -> Self {
        self.lock().fee = fee;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fee(&self) -> Nat {
        self.lock().fee.clone()
    }

    /// Ledger time used for `expires_at` checks.
    pub fn set_time(&self, now_nanos: u64) {
        self.lock().now_nanos = now_nanos;
    }

    // Any caller may mint; the borrow double mints the stable value it lends.
    pub fn mint(&self, to: &Account, amount: &Nat) {
        let mut state = self.lock();
        state.credit(to, amount);
        state.next_block();
    }

    pub fn balance_of(&self, account: &Account) -> Nat {
        self.lock().balance(account)
    }

    /// Handle whose calls are made by `caller`.
    pub fn as_caller(&self, caller: Principal) -> SimLedgerClient {
        SimLedgerClient {
            ledger: self.clone(),
            caller,
        }
    }

    pub fn approve(&self, caller: Principal, args: ApproveArgs) -> Result<Nat, ApproveError> {
        let owner = Account {
            owner: caller,
            subaccount: args.from_subaccount.clone(),
        };
        let mut state = self.lock();

        if owner == args.spender {
            return Err(ApproveError::GenericError {
                error_code: Nat::from(0u64),
                message: "self approval is not allowed".to_string(),
            });
        }
        if let Some(fee) = &args.fee {
            if *fee != state.fee {
                return Err(ApproveError::BadFee {
                    expected_fee: state.fee.clone(),
                });
            }
        }
        let balance = state.balance(&owner);
        if balance < state.fee {
            return Err(ApproveError::InsufficientFunds { balance });
        }
        let current = state.allowance(&owner, &args.spender);
        if let Some(expected) = &args.expected_allowance {
            if *expected != current.allowance {
                return Err(ApproveError::AllowanceChanged {
                    current_allowance: current.allowance,
                });
            }
        }
        if let Some(expires_at) = args.expires_at {
            if expires_at <= state.now_nanos {
                return Err(ApproveError::Expired {
                    ledger_time: state.now_nanos,
                });
            }
        }

        // replaces, never accumulates
        state.allowances.insert(
            (owner.clone(), args.spender),
            Allowance {
                allowance: args.amount,
                expires_at: args.expires_at,
            },
        );
        let fee = state.fee.clone();
        state.debit(&owner, &fee);
        Ok(state.next_block())
    }

    pub fn allowance(&self, args: &AllowanceArgs) -> Allowance {
        self.lock().allowance(&args.account, &args.spender)
    }

    pub fn transfer_from(
        &self,
        caller: Principal,
        args: TransferFromArgs,
    ) -> Result<Nat, TransferFromError> {
        let spender = Account {
            owner: caller,
            subaccount: args.spender_subaccount.clone(),
        };
        let mut state = self.lock();

        if let Some(fee) = &args.fee {
            if *fee != state.fee {
                return Err(TransferFromError::BadFee {
                    expected_fee: state.fee.clone(),
                });
            }
        }
        let debit = Nat::from(&args.amount.0 + &state.fee.0);

        let allowance = state.allowance(&args.from, &spender);
        if allowance.allowance < debit {
            return Err(TransferFromError::InsufficientAllowance {
                allowance: allowance.allowance,
            });
        }
        let balance = state.balance(&args.from);
        if balance < debit {
            return Err(TransferFromError::InsufficientFunds { balance });
        }

        state.debit(&args.from, &debit);
        state.credit(&args.to, &args.amount);

        let remaining = Allowance {
            allowance: Nat::from(&allowance.allowance.0 - &debit.0),
            expires_at: allowance.expires_at,
        };
        let key = (args.from, spender);
        if remaining.allowance.0.is_zero() {
            state.allowances.remove(&key);
        } else {
            state.allowances.insert(key, remaining);
        }
        Ok(state.next_block())
    }

    pub fn transfer(&self, caller: Principal, args: TransferArg) -> Result<Nat, TransferError> {
        let from = Account {
            owner: caller,
            subaccount: args.from_subaccount.clone(),
        };
        let mut state = self.lock();

        if let Some(fee) = &args.fee {
            if *fee != state.fee {
                return Err(TransferError::BadFee {
                    expected_fee: state.fee.clone(),
                });
            }
        }
        let debit = Nat::from(&args.amount.0 + &state.fee.0);
        let balance = state.balance(&from);
        if balance < debit {
            return Err(TransferError::InsufficientFunds { balance });
        }

        state.debit(&from, &debit);
        state.credit(&args.to, &args.amount);
        Ok(state.next_block())
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`SimLedger`] bound to one caller, as an agent would be.
#[derive(Clone)]
pub struct SimLedgerClient {
    ledger: SimLedger,
    caller: Principal,
}

impl SimLedgerClient {
    fn record(&self, method: &str) {
        self.ledger
            .log
            .record(format!("{}.{method}", self.ledger.name()));
    }
}

#[async_trait]
impl Icrc2Ledger for SimLedgerClient {
    async fn icrc1_balance_of(&self, account: Account) -> Result<Nat, E2eError> {
        self.record("icrc1_balance_of");
        Ok(self.ledger.balance_of(&account))
    }

    async fn icrc2_approve(
        &self,
        args: ApproveArgs,
    ) -> Result<Result<Nat, ApproveError>, E2eError> {
        self.record("icrc2_approve");
        Ok(self.ledger.approve(self.caller, args))
    }

    async fn icrc2_allowance(&self, args: AllowanceArgs) -> Result<Allowance, E2eError> {
        self.record("icrc2_allowance");
        Ok(self.ledger.allowance(&args))
    }
}
