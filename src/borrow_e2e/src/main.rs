// src/borrow_e2e/main.rs

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use borrow_e2e::config::HarnessConfig;
use borrow_e2e::identity::{identity_from_seed, principal_of, TEST_SEED_PHRASE};
use borrow_e2e::sim::SimWorld;
use borrow_e2e::{setup, E2eError, Scenario, ScenarioParams, ScenarioReport};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Collateral credited to the user when simulating
const SIMULATED_COLLATERAL: u64 = 10_000_000;

#[derive(Parser, Debug)]
#[command(
    name = "borrow-e2e",
    version,
    about = "Runs the deposit/withdraw round trip against the borrow canister"
)]
struct Cli {
    /// File holding the BIP-39 phrase of the calling identity
    #[arg(
        long,
        value_name = "FILE",
        required_unless_present_any = ["test_seed", "simulate"]
    )]
    seed_phrase_file: Option<PathBuf>,

    /// Sign with the built-in, publicly known test phrase (local replicas only)
    #[arg(long, conflicts_with = "seed_phrase_file")]
    test_seed: bool,

    /// Run against in-memory ledgers instead of a replica; needs no seed option
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let report = match run(&cli).await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(%err, "scenario failed");
            return Err(err.into());
        }
    };

    tracing::info!(
        initial_balance = %report.initial_balance,
        final_balance = %report.final_balance,
        loan_id = %report.loan_id,
        stable_allowance = %report.stable_allowance,
        "round trip complete"
    );
    Ok(())
}

async fn run(cli: &Cli) -> Result<ScenarioReport, E2eError> {
    let phrase = match &cli.seed_phrase_file {
        Some(path) => fs::read_to_string(path).map_err(|err| {
            E2eError::Config(format!("cannot read {}: {err}", path.display()))
        })?,
        None if cli.simulate => TEST_SEED_PHRASE.to_string(),
        None => {
            tracing::warn!("signing with the insecure test seed phrase");
            TEST_SEED_PHRASE.to_string()
        }
    };
    let identity = Arc::new(identity_from_seed(&phrase)?);

    if cli.simulate {
        let user = principal_of(identity.as_ref())?;
        let world = SimWorld::new();
        world.fund(user, SIMULATED_COLLATERAL, 0);
        let services = world.services(user);
        return Scenario::new(&services, ScenarioParams::default()).run().await;
    }

    let config = HarnessConfig::from_env()?;
    let services = setup(&config, identity).await?;
    Scenario::new(&services, ScenarioParams::from_config(&config))
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulate_needs_no_seed_option() {
        let cli = Cli::try_parse_from(["borrow-e2e", "--simulate"]).unwrap();
        assert!(cli.simulate);
        assert!(cli.seed_phrase_file.is_none());
        assert!(!cli.test_seed);
    }

    #[test]
    fn replica_run_requires_a_seed_option() {
        assert!(Cli::try_parse_from(["borrow-e2e"]).is_err());
        assert!(Cli::try_parse_from(["borrow-e2e", "--test-seed"]).is_ok());
        assert!(Cli::try_parse_from(["borrow-e2e", "--seed-phrase-file", "seed.txt"]).is_ok());
        assert!(Cli::try_parse_from([
            "borrow-e2e",
            "--test-seed",
            "--seed-phrase-file",
            "seed.txt"
        ])
        .is_err());
    }

    #[tokio::test]
    async fn simulated_run_returns_the_collateral() {
        let cli = Cli::try_parse_from(["borrow-e2e", "--simulate"]).unwrap();
        let report = run(&cli).await.unwrap();

        assert_eq!(report.initial_balance, candid::Nat::from(SIMULATED_COLLATERAL));
        assert_eq!(report.final_balance, report.initial_balance);
    }
}
