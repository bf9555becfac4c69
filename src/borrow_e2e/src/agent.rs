// src/borrow_e2e/agent.rs

use std::sync::Arc;

use candid::utils::ArgumentEncoder;
use candid::{CandidType, Principal};
use ic_agent::{Agent, Identity};
use serde::de::DeserializeOwned;

use crate::config::NetworkKind;
use crate::E2eError;

/// Connection options shared by every proxy of one run
#[derive(Clone)]
pub struct ConnectionOptions {
    pub host: String,
    pub network: NetworkKind,
    pub identity: Arc<dyn Identity>,
}

/// Build an agent signing as `options.identity`.
///
/// Against a local replica the root key is fetched first; this is the only
/// way to trust a development network and is skipped everywhere else.
pub async fn connect(options: &ConnectionOptions) -> Result<Agent, E2eError> {
    let agent = Agent::builder()
        .with_url(options.host.clone())
        .with_arc_identity(options.identity.clone())
        .build()
        .map_err(|source| E2eError::Connection {
            context: format!("building agent for {}", options.host),
            source,
        })?;

    if options.network.fetches_root_key() {
        agent
            .fetch_root_key()
            .await
            .map_err(|source| E2eError::Connection {
                context: format!("fetching root key from {}", options.host),
                source,
            })?;
        tracing::debug!(host = %options.host, "fetched local replica root key");
    } else {
        tracing::debug!(host = %options.host, "using the built-in IC root key");
    }

    Ok(agent)
}

/// Untyped handle on one canister; typed proxies wrap it.
#[derive(Clone)]
pub struct CanisterProxy {
    agent: Agent,
    canister_id: Principal,
}

impl CanisterProxy {
    pub fn new(agent: Agent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }

    pub fn canister_id(&self) -> Principal {
        self.canister_id
    }

    pub async fn query<A, R>(&self, method: &str, args: A) -> Result<R, E2eError>
    where
        A: ArgumentEncoder,
        R: CandidType + DeserializeOwned,
    {
        let arg = encode(method, args)?;
        tracing::trace!(canister = %self.canister_id, method, "query");
        let reply = self
            .agent
            .query(&self.canister_id, method)
            .with_arg(arg)
            .call()
            .await
            .map_err(|source| self.call_failed(method, source))?;
        decode(method, &reply)
    }

    pub async fn update<A, R>(&self, method: &str, args: A) -> Result<R, E2eError>
    where
        A: ArgumentEncoder,
        R: CandidType + DeserializeOwned,
    {
        let arg = encode(method, args)?;
        tracing::trace!(canister = %self.canister_id, method, "update");
        let reply = self
            .agent
            .update(&self.canister_id, method)
            .with_arg(arg)
            .call_and_wait()
            .await
            .map_err(|source| self.call_failed(method, source))?;
        decode(method, &reply)
    }

    fn call_failed(&self, method: &str, source: ic_agent::AgentError) -> E2eError {
        E2eError::Connection {
            context: format!("calling `{method}` on {}", self.canister_id),
            source,
        }
    }
}

fn encode<A: ArgumentEncoder>(method: &str, args: A) -> Result<Vec<u8>, E2eError> {
    candid::encode_args(args).map_err(|source| E2eError::Encoding {
        method: method.to_string(),
        source,
    })
}

fn decode<R: CandidType + DeserializeOwned>(method: &str, reply: &[u8]) -> Result<R, E2eError> {
    candid::decode_one(reply).map_err(|source| E2eError::Encoding {
        method: method.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{identity_from_seed, TEST_SEED_PHRASE};
    use candid::Nat;

    /// Nothing listens here.
    const UNREACHABLE_HOST: &str = "http://127.0.0.1:9";

    fn options(network: NetworkKind) -> ConnectionOptions {
        ConnectionOptions {
            host: UNREACHABLE_HOST.to_string(),
            network,
            identity: Arc::new(identity_from_seed(TEST_SEED_PHRASE).unwrap()),
        }
    }

    #[tokio::test]
    async fn mainnet_connection_never_contacts_the_host() {
        // only a root key fetch would touch the network
        assert!(connect(&options(NetworkKind::Mainnet)).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_local_replica_is_a_connection_error() {
        match connect(&options(NetworkKind::Local)).await {
            Err(E2eError::Connection { context, .. }) => {
                assert!(context.contains("root key"), "{context}");
                assert!(context.contains(UNREACHABLE_HOST), "{context}");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to {UNREACHABLE_HOST}"),
        }
    }

    #[test]
    fn reply_of_the_wrong_shape_is_an_encoding_error() {
        let reply = candid::encode_one("x").unwrap();

        match decode::<Nat>("icrc1_balance_of", &reply) {
            Err(E2eError::Encoding { method, .. }) => assert_eq!(method, "icrc1_balance_of"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(value) => panic!("decoded text as nat: {value}"),
        }
    }

    #[tokio::test]
    async fn proxies_stay_bound_to_their_canister() {
        let agent = connect(&options(NetworkKind::Mainnet)).await.unwrap();
        let ledger_id = Principal::from_text("bd3sg-teaaa-aaaaa-qaaba-cai").unwrap();
        let lending_id = Principal::from_text("bkyz2-fmaaa-aaaaa-qaaaq-cai").unwrap();

        let ledger = crate::LedgerProxy::new(CanisterProxy::new(agent.clone(), ledger_id));
        let lending = crate::LendingProxy::new(CanisterProxy::new(agent, lending_id));

        assert_eq!(ledger.canister_id(), ledger_id);
        assert_eq!(lending.canister_id(), lending_id);
    }

    #[test]
    fn matching_reply_decodes() {
        let reply = candid::encode_one(Nat::from(42u64)).unwrap();
        assert_eq!(
            decode::<Nat>("icrc1_balance_of", &reply).unwrap(),
            Nat::from(42u64)
        );
    }
}
