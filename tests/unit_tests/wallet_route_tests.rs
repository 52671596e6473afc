use rocket::serde::json::Json;
use rocket::{State, http::Status};

use subnet_batcher::models::TrackWalletRequest;
use subnet_batcher::routes::wallets::{list_wallets, track_wallet};

use crate::test_utils::TestHarness;

fn request(address: &str) -> Json<TrackWalletRequest> {
    Json(TrackWalletRequest {
        address: address.to_string(),
    })
}

#[tokio::test]
async fn test_track_wallet_empty_address() {
    let harness = TestHarness::new();
    let state = State::from(&harness.state);

    let (status, body) = track_wallet(state, request("   ")).await.unwrap_err();
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body.message, "Wallet address is empty");
}

#[tokio::test]
async fn test_track_wallet_trims_and_records_last_seen() {
    let harness = TestHarness::new();
    let state = State::from(&harness.state);

    let response = track_wallet(state, request("  dave "))
        .await
        .expect("wallet tracked")
        .into_inner();

    let wallet = response.data.unwrap();
    assert_eq!(wallet.address, "dave");
    assert!(wallet.last_seen_ms.is_some());
}

#[tokio::test]
async fn test_track_wallet_store_outage() {
    let harness = TestHarness::new();
    harness.store.set_failing(true);
    let state = State::from(&harness.state);

    let (status, _) = track_wallet(state, request("dave")).await.unwrap_err();
    assert_eq!(status, Status::ServiceUnavailable);
}

#[tokio::test]
async fn test_list_wallets_sorted_without_duplicates() {
    let harness = TestHarness::new();
    for address in ["zed", "amy", "zed", "bob"] {
        harness.state.wallets.track(address).await.unwrap();
    }
    let state = State::from(&harness.state);

    let response = list_wallets(state).await.expect("wallets listed").into_inner();

    let addresses: Vec<String> = response
        .data
        .unwrap()
        .wallets
        .into_iter()
        .map(|w| w.address)
        .collect();
    assert_eq!(addresses, vec!["amy", "bob", "zed"]);
    assert_eq!(response.message, "3 wallets tracked");
}
