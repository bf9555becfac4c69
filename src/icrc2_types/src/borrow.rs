// src/icrc2_types/borrow.rs

use candid::CandidType;
use serde::{Deserialize, Serialize};

/// `Result` of the borrow canister: `variant { ok : text; err : text }`
///
/// `deposit` returns the new loan identifier under `ok`; `withdraw` echoes
/// the closed loan identifier.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum BorrowResult {
    #[serde(rename = "ok")]
    Ok(String),
    #[serde(rename = "err")]
    Err(String),
}

impl BorrowResult {
    pub fn into_result(self) -> Result<String, String> {
        match self {
            BorrowResult::Ok(value) => Ok(value),
            BorrowResult::Err(reason) => Err(reason),
        }
    }
}
