mod common;

use borrow_e2e::{E2eError, Scenario, ScenarioParams, Services};
use candid::Nat;
use common::*;

#[tokio::test]
async fn test_collateral_allowance_mismatch_stops_the_run() {
    let world = funded_world(2_000_000, 0);
    let services = Services {
        collateral: IgnoresApprovals(world.collateral.as_caller(user())),
        stable: world.stable.as_caller(user()),
        lending: world.lending.as_caller(user()),
        lending_canister: world.lending.canister_id(),
        user: user(),
    };

    let err = Scenario::new(&services, ScenarioParams::default())
        .run()
        .await
        .unwrap_err();

    match &err {
        E2eError::Assertion {
            step,
            expected,
            actual,
            ..
        } => {
            assert_eq!(*step, 1);
            assert_eq!(*expected, Nat::from(1_000_000u64).to_string());
            assert_eq!(*actual, Nat::from(0u64).to_string());
        }
        other => panic!("unexpected error: {other}"),
    }

    // nothing from steps 2-5 was issued
    assert_eq!(
        world.log.entries(),
        vec![
            "collateral_token.icrc1_balance_of",
            "collateral_token.icrc2_allowance",
        ]
    );
}

#[tokio::test]
async fn test_stable_allowance_mismatch_leaves_loan_open() {
    let world = funded_world(2_000_000, 0);
    let services = Services {
        collateral: world.collateral.as_caller(user()),
        stable: IgnoresApprovals(world.stable.as_caller(user())),
        lending: world.lending.as_caller(user()),
        lending_canister: world.lending.canister_id(),
        user: user(),
    };

    let err = Scenario::new(&services, ScenarioParams::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::Assertion { step: 3, .. }), "{err}");
    assert_eq!(position(&world.log, "borrow.withdraw"), None);

    // no rollback: the collateral stays locked
    assert_eq!(world.lending.open_loans(), 1);
    assert_eq!(balance(&world.collateral), Nat::from(1_800_000u64));
}
