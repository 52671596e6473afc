use rocket::serde::json::Json;
use rocket::{State, http::Status};
use std::time::Duration;

use subnet_batcher::models::{CoordinatorConfig, EventKind};
use subnet_batcher::routes::transactions::submit_transaction;

use crate::test_utils::{TestHarness, test_config, transfer};

#[tokio::test]
async fn test_submit_rejects_zero_amount() {
    let harness = TestHarness::new();
    let state = State::from(&harness.state);

    let result = submit_transaction(state, Json(transfer("alice", "bob", 0))).await;

    let (status, body) = result.unwrap_err();
    assert_eq!(status, Status::BadRequest);
    assert!(!body.success);
    assert!(body.message.contains("amount"));
    assert!(harness.engine.mine_calls().is_empty());
}

#[tokio::test]
async fn test_submit_rejects_self_transfer() {
    let harness = TestHarness::new();
    let state = State::from(&harness.state);

    let result = submit_transaction(state, Json(transfer("alice", "ALICE", 5))).await;

    let (status, _) = result.unwrap_err();
    assert_eq!(status, Status::BadRequest);
}

#[tokio::test]
async fn test_submit_enqueues_and_tracks_both_wallets() {
    let harness = TestHarness::new();
    let state = State::from(&harness.state);

    let response = submit_transaction(state, Json(transfer("alice", "bob", 7)))
        .await
        .expect("transfer accepted")
        .into_inner();

    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(data.queue_length, 1);
    assert_eq!(data.transaction.amount, 7);

    let wallets = harness.state.wallets.list().await.unwrap();
    assert_eq!(wallets, vec!["alice".to_string(), "bob".to_string()]);
}

#[tokio::test]
async fn test_submit_publishes_transaction_added() {
    let harness = TestHarness::new();
    let mut rx = harness.state.hub.subscribe(harness.state.channel());
    let state = State::from(&harness.state);

    submit_transaction(state, Json(transfer("alice", "bob", 3)))
        .await
        .expect("transfer accepted");

    let message = rx.recv().await.unwrap();
    assert_eq!(message.event, EventKind::TransactionAdded);
    assert_eq!(message.payload["queueLength"], 1);
    assert_eq!(message.payload["transaction"]["from"], "alice");
    assert_eq!(message.payload["queue"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_reports_engine_outage() {
    let harness = TestHarness::new();
    harness.engine.set_unavailable(true);
    let state = State::from(&harness.state);

    let result = submit_transaction(state, Json(transfer("alice", "bob", 3))).await;

    let (status, body) = result.unwrap_err();
    assert_eq!(status, Status::BadGateway);
    assert!(body.message.contains("Failed to enqueue"));
}

#[tokio::test]
async fn test_submit_filling_queue_triggers_batch() {
    let harness = TestHarness::with_config(CoordinatorConfig {
        max_queue_length: 3,
        ..test_config("queue-full")
    });
    harness.state.processor.timer().reset().await.unwrap();
    harness.engine.seed_queue(2);
    let state = State::from(&harness.state);

    let response = submit_transaction(state, Json(transfer("alice", "bob", 1)))
        .await
        .expect("transfer accepted")
        .into_inner();
    assert_eq!(response.data.unwrap().queue_length, 3);

    // Trigger evaluation runs in the background after the response
    for _ in 0..50 {
        if !harness.engine.mine_calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(harness.engine.mine_calls(), vec![3]);
}
