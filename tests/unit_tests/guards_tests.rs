use rocket::http::{Header, Status};

use subnet_batcher::guards::ApiToken;

use crate::test_utils::{TestHarness, auth_header};

#[test]
fn test_api_token_struct() {
    let token = ApiToken("test_token".to_string());
    assert_eq!(token.0, "test_token");

    let special_token = ApiToken("token-with-special_chars.123".to_string());
    assert_eq!(special_token.0, "token-with-special_chars.123");
}

#[tokio::test]
async fn test_admin_route_without_header() {
    let harness = TestHarness::new();
    let client = harness.client().await;

    let response = client.post("/admin/trigger_batch").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
}

#[tokio::test]
async fn test_admin_route_with_wrong_token() {
    let harness = TestHarness::new();
    harness.engine.seed_queue(2);
    let client = harness.client().await;

    let response = client
        .post("/admin/trigger_batch")
        .header(Header::new("Authorization", "Bearer not-the-token"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
    assert!(harness.engine.mine_calls().is_empty());
}

#[tokio::test]
async fn test_admin_route_without_bearer_prefix() {
    let harness = TestHarness::new();
    let client = harness.client().await;

    let response = client
        .post("/admin/clear_queue")
        .header(Header::new("Authorization", crate::test_utils::TEST_TOKEN))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}

#[tokio::test]
async fn test_admin_route_with_valid_token() {
    let harness = TestHarness::new();
    harness.engine.seed_queue(2);
    let client = harness.client().await;

    let response = client
        .post("/admin/trigger_batch")
        .header(auth_header())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    assert_eq!(harness.engine.mine_calls(), vec![2]);
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let harness = TestHarness::new();
    let client = harness.client().await;

    for path in ["/", "/status", "/queue", "/wallets"] {
        let response = client.get(path).dispatch().await;
        assert_eq!(response.status(), Status::Ok, "GET {path}");
    }
}
