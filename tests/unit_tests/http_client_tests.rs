use rocket::http::{ContentType, Status};
use rocket::tokio::io::AsyncReadExt;
use std::time::Duration;

use subnet_batcher::services::lock::TIMER_LOCK;

use crate::test_utils::TestHarness;

async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let harness = TestHarness::new();
    let client = harness.client().await;

    let response = client.get("/openapi.json").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = response.into_json().await.expect("openapi json");
    let paths = body["paths"].as_object().unwrap();
    assert!(paths.contains_key("/transactions"));
    assert!(paths.contains_key("/admin/settle"));
}

#[tokio::test]
async fn test_submit_transaction_over_http() {
    let harness = TestHarness::new();
    let client = harness.client().await;

    let response = client
        .post("/transactions")
        .header(ContentType::JSON)
        .body(r#"{"from":"alice","to":"bob","amount":10}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = response.into_json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["queue_length"], 1);
}

#[tokio::test]
async fn test_submit_malformed_transaction_over_http() {
    let harness = TestHarness::new();
    let client = harness.client().await;

    let response = client
        .post("/transactions")
        .header(ContentType::JSON)
        .body(r#"{"from":"alice"}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[tokio::test]
async fn test_event_stream_opens_session_and_sends_snapshot() {
    let harness = TestHarness::new();
    let client = harness.client().await;
    let channel = harness.state.channel().to_string();

    let mut response = client.get(format!("/events/{channel}")).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::EventStream));

    let mut buf = vec![0u8; 4096];
    let read = tokio::time::timeout(Duration::from_secs(2), response.read(&mut buf))
        .await
        .expect("first event in time")
        .unwrap();
    let text = String::from_utf8_lossy(&buf[..read]);
    assert!(text.contains("status"), "unexpected first frame: {text}");
    assert!(text.contains("timerDefault"), "unexpected first frame: {text}");
    assert_eq!(harness.state.hub.subscriber_count(&channel), 1);

    // The only session on this instance takes over the countdown
    let lock = harness.state.processor.lock();
    assert!(wait_for(move || async move { lock.is_locked(TIMER_LOCK).await.unwrap() }).await);

    drop(response);

    assert!(
        wait_for(move || async move { !lock.is_locked(TIMER_LOCK).await.unwrap() }).await,
        "timer lock should be handed back when the client disconnects"
    );
    assert_eq!(harness.state.hub.subscriber_count(&channel), 0);
}

#[tokio::test]
async fn test_event_stream_for_other_channel_is_not_found() {
    let harness = TestHarness::new();
    let client = harness.client().await;

    for channel in ["subnet-other", "random-1", "random-2"] {
        let response = client.get(format!("/events/{channel}")).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    // No session was started and no broadcast channel was allocated
    assert_eq!(harness.state.hub.channel_count(), 0);
    assert!(
        !harness
            .state
            .processor
            .lock()
            .is_locked(TIMER_LOCK)
            .await
            .unwrap()
    );
}
