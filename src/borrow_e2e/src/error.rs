use std::time::Duration;

use thiserror::Error;

/// Every way a scenario run can fail. None of these are recovered from: the
/// step that raised one aborts and the error is reported as-is.
#[derive(Error, Debug)]
pub enum E2eError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(#[from] bip39::Error),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("connection failed ({context}): {source}")]
    Connection {
        context: String,
        #[source]
        source: ic_agent::AgentError,
    },
    #[error("candid shape mismatch on `{method}`: {source}")]
    Encoding {
        method: String,
        #[source]
        source: candid::Error,
    },
    #[error("`{method}` returned an error: {reason}")]
    RemoteOperation { method: String, reason: String },
    #[error("step {step}: {subject} mismatch (expected {expected}, actual {actual})")]
    Assertion {
        step: u8,
        subject: String,
        expected: String,
        actual: String,
    },
    #[error("`{method}` did not complete within {after:?}")]
    Timeout { method: String, after: Duration },
}

impl E2eError {
    pub(crate) fn remote(method: &str, reason: impl Into<String>) -> Self {
        E2eError::RemoteOperation {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}
