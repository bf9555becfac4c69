// src/borrow_e2e/identity.rs

use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use candid::Principal;
use ic_agent::identity::Secp256k1Identity;
use ic_agent::Identity;

use crate::E2eError;

/// Completely insecure seed phrase. Do not use for any purpose other than
/// testing against a local replica.
pub const TEST_SEED_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// BIP-44 path with the ICP coin type (223), same as dfx.
pub const DERIVATION_PATH: &str = "m/44'/223'/0'/0/0";

/// Derive the secp256k1 signing identity for `phrase`.
pub fn identity_from_seed(phrase: &str) -> Result<Secp256k1Identity, E2eError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase.trim())?;
    let seed = mnemonic.to_seed("");

    let path: DerivationPath = DERIVATION_PATH
        .parse()
        .map_err(|err: bip32::Error| E2eError::KeyDerivation(err.to_string()))?;
    let node = XPrv::derive_from_path(seed, &path)
        .map_err(|err| E2eError::KeyDerivation(err.to_string()))?;

    let secret = k256::SecretKey::from(node.private_key());
    Ok(Secp256k1Identity::from_private_key(secret))
}

pub fn principal_of(identity: &dyn Identity) -> Result<Principal, E2eError> {
    identity.sender().map_err(E2eError::KeyDerivation)
}
