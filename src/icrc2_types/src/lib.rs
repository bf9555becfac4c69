// src/icrc2_types/lib.rs
//
// Candid wire types shared by the ICRC-2 ledgers and the borrow canister.

mod borrow;
mod ledger;

pub use borrow::BorrowResult;
pub use ledger::{
    Account, Allowance, AllowanceArgs, ApproveArgs, ApproveError, Subaccount, TransferArg,
    TransferError, TransferFromArgs, TransferFromError,
};
