// src/borrow_e2e/scenario.rs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use candid::{Nat, Principal};
use ic_agent::Identity;
use icrc2_types::{Account, AllowanceArgs, ApproveArgs, BorrowResult};
use tracing::instrument;

use crate::agent::{connect, CanisterProxy, ConnectionOptions};
use crate::config::{
    CanisterManifest, HarnessConfig, BORROW, COLLATERAL_TOKEN, DEFAULT_CALL_TIMEOUT,
    DEFAULT_DEPOSIT_TIMEOUT, STABLE_TOKEN,
};
use crate::identity::principal_of;
use crate::ledger::{Icrc2Ledger, LedgerProxy};
use crate::lending::{LendingProxy, LendingService, LoanId};
use crate::E2eError;

/// Collateral allowance granted to the borrow canister in step 1
pub const COLLATERAL_ALLOWANCE: u64 = 1_000_000;
/// Collateral locked by `deposit` in step 2
pub const DEPOSIT_AMOUNT: u64 = 200_000;

/// The three services of one run plus the two principals the steps need.
pub struct Services<C, S, L> {
    pub collateral: C,
    pub stable: S,
    pub lending: L,
    /// Spender of both allowances
    pub lending_canister: Principal,
    /// Owner of every balance and allowance queried
    pub user: Principal,
}

/// Resolve the canisters, connect once and bind one proxy per canister.
pub async fn setup(
    config: &HarnessConfig,
    identity: Arc<dyn Identity>,
) -> Result<Services<LedgerProxy, LedgerProxy, LendingProxy>, E2eError> {
    let manifest = CanisterManifest::load(&config.manifest_path)?;
    let collateral_id = manifest.resolve(COLLATERAL_TOKEN, &config.network)?;
    let stable_id = manifest.resolve(STABLE_TOKEN, &config.network)?;
    let lending_id = manifest.resolve(BORROW, &config.network)?;

    let signer = principal_of(identity.as_ref())?;
    let user = match config.user_principal {
        Some(user) if user != signer => {
            tracing::warn!(%user, %signer, "USER_PRINCIPAL differs from the signing identity");
            user
        }
        Some(user) => user,
        None => signer,
    };

    let agent = connect(&ConnectionOptions {
        host: config.host.clone(),
        network: config.network_kind(),
        identity,
    })
    .await?;

    let collateral = LedgerProxy::new(CanisterProxy::new(agent.clone(), collateral_id));
    let stable = LedgerProxy::new(CanisterProxy::new(agent.clone(), stable_id));
    let lending = LendingProxy::new(CanisterProxy::new(agent, lending_id));

    tracing::info!(
        host = %config.host,
        collateral = %collateral.canister_id(),
        stable = %stable.canister_id(),
        lending = %lending.canister_id(),
        %user,
        "services ready"
    );

    Ok(Services {
        lending_canister: lending.canister_id(),
        collateral,
        stable,
        lending,
        user,
    })
}

#[derive(Clone, Debug)]
pub struct ScenarioParams {
    pub collateral_allowance: Nat,
    pub deposit_amount: Nat,
    /// `deposit` makes nested ledger calls and gets a longer budget.
    pub deposit_timeout: Duration,
    pub call_timeout: Duration,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            collateral_allowance: Nat::from(COLLATERAL_ALLOWANCE),
            deposit_amount: Nat::from(DEPOSIT_AMOUNT),
            deposit_timeout: DEFAULT_DEPOSIT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl ScenarioParams {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            deposit_timeout: config.deposit_timeout,
            call_timeout: config.call_timeout,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioReport {
    pub initial_balance: Nat,
    pub loan_id: LoanId,
    pub stable_allowance: Nat,
    pub final_balance: Nat,
}

/// Deposit collateral, borrow stable value, repay, and check the collateral
/// came back. Steps run strictly in order and the first failure ends the run.
pub struct Scenario<'a, C, S, L> {
    services: &'a Services<C, S, L>,
    params: ScenarioParams,
}

impl<'a, C, S, L> Scenario<'a, C, S, L>
where
    C: Icrc2Ledger,
    S: Icrc2Ledger,
    L: LendingService,
{
    pub fn new(services: &'a Services<C, S, L>, params: ScenarioParams) -> Self {
        Self { services, params }
    }

    pub async fn run(&self) -> Result<ScenarioReport, E2eError> {
        let initial_balance = self.approve_collateral().await?;
        let loan_id = self.deposit().await?;
        let stable_allowance = self.approve_stable().await?;
        self.withdraw(&loan_id).await?;
        let final_balance = self.verify_collateral_returned(&initial_balance).await?;

        tracing::info!(%loan_id, %final_balance, "scenario passed");
        Ok(ScenarioReport {
            initial_balance,
            loan_id,
            stable_allowance,
            final_balance,
        })
    }

    /// Step 1. Returns the collateral balance before anything moved.
    #[instrument(name = "step", skip_all, fields(step = 1))]
    pub async fn approve_collateral(&self) -> Result<Nat, E2eError> {
        let collateral = &self.services.collateral;
        let initial_balance = self
            .call("icrc1_balance_of", collateral.icrc1_balance_of(self.user()))
            .await?;
        tracing::info!(%initial_balance, "collateral balance");

        let amount = self.params.collateral_allowance.clone();
        self.approve(collateral, amount.clone()).await?;

        let allowance = self
            .call("icrc2_allowance", collateral.icrc2_allowance(self.allowance_args()))
            .await?;
        ensure_eq(1, "collateral allowance", &amount, &allowance.allowance)?;

        Ok(initial_balance)
    }

    /// Step 2. Returns the identifier of the loan just opened.
    #[instrument(name = "step", skip_all, fields(step = 2))]
    pub async fn deposit(&self) -> Result<LoanId, E2eError> {
        let amount = self.params.deposit_amount.clone();
        tracing::info!(%amount, timeout = ?self.params.deposit_timeout, "depositing collateral");

        let result = within(
            "deposit",
            self.params.deposit_timeout,
            self.services.lending.deposit(amount),
        )
        .await?;

        let id = expect_ok("deposit", result)?;
        let loan_id = LoanId::new(id).ok_or_else(|| E2eError::Assertion {
            step: 2,
            subject: "loan identifier".to_string(),
            expected: "non-empty".to_string(),
            actual: "\"\"".to_string(),
        })?;
        tracing::info!(%loan_id, "loan opened");

        Ok(loan_id)
    }

    /// Step 3. Approves the whole stable balance; returns that amount.
    #[instrument(name = "step", skip_all, fields(step = 3))]
    pub async fn approve_stable(&self) -> Result<Nat, E2eError> {
        let stable = &self.services.stable;
        let balance = self
            .call("icrc1_balance_of", stable.icrc1_balance_of(self.user()))
            .await?;
        tracing::info!(%balance, "stable balance");

        self.approve(stable, balance.clone()).await?;

        let allowance = self
            .call("icrc2_allowance", stable.icrc2_allowance(self.allowance_args()))
            .await?;
        ensure_eq(3, "stable allowance", &balance, &allowance.allowance)?;

        Ok(balance)
    }

    /// Step 4.
    #[instrument(name = "step", skip_all, fields(step = 4, %loan_id))]
    pub async fn withdraw(&self, loan_id: &LoanId) -> Result<(), E2eError> {
        let result = self
            .call("withdraw", self.services.lending.withdraw(loan_id))
            .await?;
        expect_ok("withdraw", result)?;
        tracing::info!("loan closed");
        Ok(())
    }

    /// Step 5. Returns the collateral balance after the round trip.
    #[instrument(name = "step", skip_all, fields(step = 5))]
    pub async fn verify_collateral_returned(&self, initial_balance: &Nat) -> Result<Nat, E2eError> {
        let current = self
            .call(
                "icrc1_balance_of",
                self.services.collateral.icrc1_balance_of(self.user()),
            )
            .await?;
        ensure_eq(5, "collateral balance", initial_balance, &current)?;
        Ok(current)
    }

    async fn approve<T: Icrc2Ledger + ?Sized>(&self, ledger: &T, amount: Nat) -> Result<(), E2eError> {
        let args = ApproveArgs::new(Account::new(self.services.lending_canister), amount);
        let verdict = self.call("icrc2_approve", ledger.icrc2_approve(args)).await?;
        let block = verdict.map_err(|err| E2eError::remote("icrc2_approve", format!("{err:?}")))?;
        tracing::debug!(%block, "approved");
        Ok(())
    }

    async fn call<T>(
        &self,
        method: &str,
        call: impl Future<Output = Result<T, E2eError>>,
    ) -> Result<T, E2eError> {
        within(method, self.params.call_timeout, call).await
    }

    fn user(&self) -> Account {
        Account::new(self.services.user)
    }

    fn allowance_args(&self) -> AllowanceArgs {
        AllowanceArgs {
            account: self.user(),
            spender: Account::new(self.services.lending_canister),
        }
    }
}

async fn within<T>(
    method: &str,
    after: Duration,
    call: impl Future<Output = Result<T, E2eError>>,
) -> Result<T, E2eError> {
    tokio::time::timeout(after, call)
        .await
        .map_err(|_| E2eError::Timeout {
            method: method.to_string(),
            after,
        })?
}

fn expect_ok(method: &str, result: BorrowResult) -> Result<String, E2eError> {
    result
        .into_result()
        .map_err(|reason| E2eError::remote(method, reason))
}

fn ensure_eq(step: u8, subject: &str, expected: &Nat, actual: &Nat) -> Result<(), E2eError> {
    if expected == actual {
        return Ok(());
    }
    Err(E2eError::Assertion {
        step,
        subject: subject.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}
