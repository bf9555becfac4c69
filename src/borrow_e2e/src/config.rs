// src/borrow_e2e/config.rs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use candid::Principal;
use serde::Deserialize;

use crate::E2eError;

/// Logical canister names, as keyed in `canister_ids.json`
pub const COLLATERAL_TOKEN: &str = "collateral_token";
pub const STABLE_TOKEN: &str = "stable_token";
pub const BORROW: &str = "borrow";

pub const DEFAULT_HOST: &str = "http://127.0.0.1:8000";
pub const DEFAULT_NETWORK: &str = "local";
pub const DEFAULT_DEPOSIT_TIMEOUT: Duration = Duration::from_secs(70);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_USER_PRINCIPAL: &str = "USER_PRINCIPAL";
const ENV_HOST: &str = "IC_HOST";
const ENV_NETWORK: &str = "DFX_NETWORK";
const ENV_CANISTER_IDS: &str = "CANISTER_IDS_PATH";
const ENV_DEPOSIT_TIMEOUT: &str = "BORROW_E2E_DEPOSIT_TIMEOUT_SECS";
const ENV_CALL_TIMEOUT: &str = "BORROW_E2E_CALL_TIMEOUT_SECS";

/// Hosts that always front the IC mainnet
const MAINNET_HOSTS: [&str; 3] = ["ic0.app", "icp0.io", "icp-api.io"];

/// Whether the target network may hand out its root key over HTTP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkKind {
    Local,
    Mainnet,
}

impl NetworkKind {
    pub fn classify(network: &str, host: &str) -> Self {
        let on_mainnet_host = MAINNET_HOSTS.iter().any(|h| host.contains(h));
        if network == "ic" || on_mainnet_host {
            NetworkKind::Mainnet
        } else {
            NetworkKind::Local
        }
    }

    /// The root key is only ever fetched from a local development replica.
    pub fn fetches_root_key(self) -> bool {
        matches!(self, NetworkKind::Local)
    }
}

/// dfx deployment manifest: `{ "<canister>": { "<network>": "<principal>" } }`
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(transparent)]
pub struct CanisterManifest(HashMap<String, HashMap<String, String>>);

impl CanisterManifest {
    pub fn load(path: &Path) -> Result<Self, E2eError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            E2eError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, E2eError> {
        serde_json::from_str(raw)
            .map_err(|err| E2eError::Config(format!("malformed canister manifest: {err}")))
    }

    pub fn resolve(&self, canister: &str, network: &str) -> Result<Principal, E2eError> {
        let text = self
            .0
            .get(canister)
            .ok_or_else(|| E2eError::Config(format!("canister `{canister}` not in manifest")))?
            .get(network)
            .ok_or_else(|| {
                E2eError::Config(format!(
                    "canister `{canister}` has no id for network `{network}`"
                ))
            })?;

        Principal::from_text(text).map_err(|err| {
            E2eError::Config(format!("canister `{canister}` has invalid id `{text}`: {err}"))
        })
    }
}

/// Everything the harness reads from the environment.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub host: String,
    pub network: String,
    pub manifest_path: PathBuf,
    pub user_principal: Option<Principal>,
    pub deposit_timeout: Duration,
    pub call_timeout: Duration,
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, E2eError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, E2eError> {
        let network = lookup(ENV_NETWORK).unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let host = lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let manifest_path = lookup(ENV_CANISTER_IDS)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!(".dfx/{network}/canister_ids.json")));

        let user_principal = match lookup(ENV_USER_PRINCIPAL) {
            Some(text) if !text.trim().is_empty() => {
                Some(Principal::from_text(text.trim()).map_err(|err| {
                    E2eError::Config(format!("{ENV_USER_PRINCIPAL} is not a principal: {err}"))
                })?)
            }
            _ => None,
        };

        let deposit_timeout = match lookup(ENV_DEPOSIT_TIMEOUT) {
            Some(raw) => parse_timeout_secs(ENV_DEPOSIT_TIMEOUT, &raw)?,
            None => DEFAULT_DEPOSIT_TIMEOUT,
        };
        let call_timeout = match lookup(ENV_CALL_TIMEOUT) {
            Some(raw) => parse_timeout_secs(ENV_CALL_TIMEOUT, &raw)?,
            None => DEFAULT_CALL_TIMEOUT,
        };

        Ok(Self {
            host,
            network,
            manifest_path,
            user_principal,
            deposit_timeout,
            call_timeout,
        })
    }

    pub fn network_kind(&self) -> NetworkKind {
        NetworkKind::classify(&self.network, &self.host)
    }
}

fn parse_timeout_secs(key: &str, raw: &str) -> Result<Duration, E2eError> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        E2eError::Config(format!("{key} must be a positive integer number of seconds"))
    })?;
    if secs == 0 {
        return Err(E2eError::Config(format!("{key} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"{
        "borrow": { "local": "bkyz2-fmaaa-aaaaa-qaaaq-cai" },
        "collateral_token": { "local": "bd3sg-teaaa-aaaaa-qaaba-cai" },
        "stable_token": { "local": "be2us-64aaa-aaaaa-qaabq-cai", "ic": "not-a-principal" }
    }"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn resolves_canisters_per_network() {
        let manifest = CanisterManifest::from_json(MANIFEST).unwrap();
        let borrow = manifest.resolve(BORROW, "local").unwrap();
        assert_eq!(borrow.to_text(), "bkyz2-fmaaa-aaaaa-qaaaq-cai");
    }

    #[test]
    fn resolution_failures_are_config_errors() {
        let manifest = CanisterManifest::from_json(MANIFEST).unwrap();

        for (canister, network) in [
            ("liquidator", "local"),
            (BORROW, "ic"),
            (STABLE_TOKEN, "ic"),
        ] {
            let err = manifest.resolve(canister, network).unwrap_err();
            assert!(matches!(err, E2eError::Config(_)), "{canister}/{network}: {err}");
        }
    }

    #[test]
    fn loads_manifest_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let manifest = CanisterManifest::load(file.path()).unwrap();
        assert!(manifest.resolve(COLLATERAL_TOKEN, "local").is_ok());

        let missing = CanisterManifest::load(Path::new("/nonexistent/canister_ids.json"));
        assert!(matches!(missing, Err(E2eError::Config(_))));
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = HarnessConfig::from_lookup(env(&[])).unwrap();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.network, "local");
        assert_eq!(
            config.manifest_path,
            PathBuf::from(".dfx/local/canister_ids.json")
        );
        assert_eq!(config.user_principal, None);
        assert_eq!(config.deposit_timeout, Duration::from_secs(70));
        assert_eq!(config.call_timeout, DEFAULT_CALL_TIMEOUT);
        assert_eq!(config.network_kind(), NetworkKind::Local);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = HarnessConfig::from_lookup(env(&[
            ("USER_PRINCIPAL", "2vxsx-fae"),
            ("IC_HOST", "http://localhost:4943"),
            ("DFX_NETWORK", "staging"),
            ("BORROW_E2E_DEPOSIT_TIMEOUT_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.user_principal, Some(Principal::anonymous()));
        assert_eq!(config.host, "http://localhost:4943");
        assert_eq!(
            config.manifest_path,
            PathBuf::from(".dfx/staging/canister_ids.json")
        );
        assert_eq!(config.deposit_timeout, Duration::from_secs(120));
    }

    #[test]
    fn bad_values_are_rejected() {
        for pairs in [
            [("USER_PRINCIPAL", "definitely not a principal")],
            [("BORROW_E2E_DEPOSIT_TIMEOUT_SECS", "0")],
            [("BORROW_E2E_CALL_TIMEOUT_SECS", "soon")],
        ] {
            let err = HarnessConfig::from_lookup(env(&pairs)).unwrap_err();
            assert!(matches!(err, E2eError::Config(_)), "{pairs:?}: {err}");
        }
    }

    #[test]
    fn root_key_is_only_fetched_locally() {
        assert!(NetworkKind::classify("local", DEFAULT_HOST).fetches_root_key());
        assert!(!NetworkKind::classify("ic", DEFAULT_HOST).fetches_root_key());
        assert!(!NetworkKind::classify("local", "https://icp-api.io").fetches_root_key());
        assert!(!NetworkKind::classify("staging", "https://ic0.app").fetches_root_key());
    }
}
