// src/icrc2_types/ledger.rs

use candid::{CandidType, Nat, Principal};
use serde::{Deserialize, Serialize};

/// 32-byte subaccount selector (`blob` on the wire)
pub type Subaccount = Vec<u8>;

/// ICRC-1 account: an owner plus an optional subaccount
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Account {
    pub owner: Principal,
    pub subaccount: Option<Subaccount>,
}

impl Account {
    /// Default subaccount of `owner`
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            subaccount: None,
        }
    }
}

impl From<Principal> for Account {
    fn from(owner: Principal) -> Self {
        Self::new(owner)
    }
}

/// Argument of `icrc2_approve`
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApproveArgs {
    pub fee: Option<Nat>,
    pub amount: Nat,
    pub memo: Option<Vec<u8>>,
    pub from_subaccount: Option<Subaccount>,
    pub created_at_time: Option<u64>,
    pub expected_allowance: Option<Nat>,
    pub expires_at: Option<u64>,
    pub spender: Account,
}

impl ApproveArgs {
    /// Approve `amount` to `spender` with every optional field left unset.
    pub fn new(spender: Account, amount: Nat) -> Self {
        Self {
            fee: None,
            amount,
            memo: None,
            from_subaccount: None,
            created_at_time: None,
            expected_allowance: None,
            expires_at: None,
            spender,
        }
    }
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ApproveError {
    BadFee { expected_fee: Nat },
    InsufficientFunds { balance: Nat },
    AllowanceChanged { current_allowance: Nat },
    Expired { ledger_time: u64 },
    TooOld,
    CreatedInFuture { ledger_time: u64 },
    Duplicate { duplicate_of: Nat },
    TemporarilyUnavailable,
    GenericError { error_code: Nat, message: String },
}

/// Argument of `icrc2_allowance`
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AllowanceArgs {
    pub account: Account,
    pub spender: Account,
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Allowance {
    pub allowance: Nat,
    pub expires_at: Option<u64>,
}

/// Argument of `icrc2_transfer_from`
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransferFromArgs {
    pub spender_subaccount: Option<Subaccount>,
    pub from: Account,
    pub to: Account,
    pub amount: Nat,
    pub fee: Option<Nat>,
    pub memo: Option<Vec<u8>>,
    pub created_at_time: Option<u64>,
}

impl TransferFromArgs {
    pub fn new(from: Account, to: Account, amount: Nat) -> Self {
        Self {
            spender_subaccount: None,
            from,
            to,
            amount,
            fee: None,
            memo: None,
            created_at_time: None,
        }
    }
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum TransferFromError {
    BadFee { expected_fee: Nat },
    BadBurn { min_burn_amount: Nat },
    InsufficientFunds { balance: Nat },
    InsufficientAllowance { allowance: Nat },
    TooOld,
    CreatedInFuture { ledger_time: u64 },
    Duplicate { duplicate_of: Nat },
    TemporarilyUnavailable,
    GenericError { error_code: Nat, message: String },
}

/// Argument of `icrc1_transfer`
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransferArg {
    pub from_subaccount: Option<Subaccount>,
    pub to: Account,
    pub amount: Nat,
    pub fee: Option<Nat>,
    pub memo: Option<Vec<u8>>,
    pub created_at_time: Option<u64>,
}

impl TransferArg {
    pub fn new(to: Account, amount: Nat) -> Self {
        Self {
            from_subaccount: None,
            to,
            amount,
            fee: None,
            memo: None,
            created_at_time: None,
        }
    }
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum TransferError {
    BadFee { expected_fee: Nat },
    BadBurn { min_burn_amount: Nat },
    InsufficientFunds { balance: Nat },
    TooOld,
    CreatedInFuture { ledger_time: u64 },
    Duplicate { duplicate_of: Nat },
    TemporarilyUnavailable,
    GenericError { error_code: Nat, message: String },
}
