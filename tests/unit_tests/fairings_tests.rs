use rocket::fairing::Fairing;
use std::time::Duration;

use subnet_batcher::fairings::{CoordinatorBootstrap, RequestLogger, ServerErrorReporter};
use subnet_batcher::models::CoordinatorConfig;
use subnet_batcher::services::store::SharedStore;

use crate::test_utils::{TestHarness, test_config};

#[test]
fn test_fairing_names() {
    assert_eq!(RequestLogger.info().name, "Request/Response Logger");
    assert_eq!(ServerErrorReporter.info().name, "Server Error Reporter");
    assert_eq!(CoordinatorBootstrap.info().name, "Coordinator Bootstrap");
}

#[test]
fn test_fairing_trait_implementation() {
    fn check_fairing<T: Fairing>(_fairing: T) {}

    check_fairing(RequestLogger);
    check_fairing(ServerErrorReporter);
    check_fairing(CoordinatorBootstrap);
}

#[tokio::test]
async fn test_bootstrap_initializes_timer() {
    let harness = TestHarness::new();

    let _client = harness.client().await;

    // Liftoff writes the default countdown when none exists yet
    let raw = harness
        .state
        .store
        .get(&harness.state.config.keys().batch_timer())
        .await
        .unwrap();
    assert_eq!(raw.as_deref(), Some("30"));
}

#[tokio::test]
async fn test_bootstrap_keeps_existing_timer() {
    let harness = TestHarness::new();
    harness.state.processor.timer().set(7).await.unwrap();

    let _client = harness.client().await;

    assert_eq!(harness.state.processor.timer().get().await, 7);
}

#[tokio::test]
async fn test_bootstrap_prunes_stale_wallets() {
    let harness = TestHarness::with_config(CoordinatorConfig {
        wallet_max_age: Duration::ZERO,
        wallet_sweep_interval: Duration::from_millis(20),
        ..test_config("sweeper")
    });
    harness.state.wallets.track("old-wallet").await.unwrap();

    let _client = harness.client().await;

    for _ in 0..50 {
        if harness.state.wallets.list().await.unwrap().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("wallet sweep never pruned the stale wallet");
}
