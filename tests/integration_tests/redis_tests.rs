// Multi-instance behavior against a real Redis
//
// Run with: REDIS_URL=redis://127.0.0.1:6379 cargo test --test integration_tests -- --ignored

use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

use subnet_batcher::models::{CoordinatorConfig, EventKind};
use subnet_batcher::services::batch::BatchOutcome;
use subnet_batcher::services::broadcast::{
    BroadcastAdapter, LocalBroadcaster, RedisBroadcaster, spawn_relay,
};
use subnet_batcher::services::engine::MockEngine;
use subnet_batcher::services::lock::{BATCH_LOCK, DistributedLock};
use subnet_batcher::services::store::{RedisStore, SharedStore};

use crate::test_utils::{SimulatedInstance, test_config};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

async fn connect() -> RedisStore {
    RedisStore::connect(&redis_url())
        .await
        .expect("Failed to connect to Redis")
}

#[tokio::test]
#[ignore = "requires Redis"]
#[serial]
async fn test_redis_lock_mutual_exclusion() {
    let store = connect().await;
    let config = test_config("redis-locks");
    let shared: Arc<dyn SharedStore> = Arc::new(store.clone());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let lock = DistributedLock::new(shared.clone(), config.keys(), format!("instance-{i}"));
            tokio::spawn(async move { lock.acquire(BATCH_LOCK, Duration::from_secs(5)).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    store
        .cleanup_prefix(&config.key_prefix)
        .await
        .expect("Failed to cleanup");
}

#[tokio::test]
#[ignore = "requires Redis"]
#[serial]
async fn test_redis_lock_expires() {
    let store = connect().await;
    let config = test_config("redis-ttl");
    let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
    let crashed = DistributedLock::new(shared.clone(), config.keys(), "crashed".to_string());
    let survivor = DistributedLock::new(shared, config.keys(), "survivor".to_string());

    assert!(crashed.acquire(BATCH_LOCK, Duration::from_millis(300)).await);
    assert!(!survivor.acquire(BATCH_LOCK, Duration::from_millis(300)).await);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(survivor.acquire(BATCH_LOCK, Duration::from_millis(300)).await);

    store
        .cleanup_prefix(&config.key_prefix)
        .await
        .expect("Failed to cleanup");
}

#[tokio::test]
#[ignore = "requires Redis"]
#[serial]
async fn test_redis_instances_settle_once() {
    let store = connect().await;
    let engine = MockEngine::new();
    engine.seed_queue(3);
    engine.set_mine_delay(Duration::from_millis(200));
    let shared = test_config("redis-batch");

    let nodes: Vec<SimulatedInstance> = (0..4)
        .map(|i| {
            let config = CoordinatorConfig {
                instance_id: format!("instance-{i}"),
                ..shared.clone()
            };
            SimulatedInstance::with_store(config, Arc::new(store.clone()), &engine)
        })
        .collect();
    nodes[0].processor.timer().set(0).await.unwrap();

    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let processor = node.processor.clone();
            tokio::spawn(async move { processor.evaluate_and_act().await })
        })
        .collect();

    let mut processed = 0;
    for handle in handles {
        if let BatchOutcome::Processed(_) = handle.await.unwrap() {
            processed += 1;
        }
    }
    assert_eq!(processed, 1);
    assert_eq!(engine.mine_calls(), vec![3]);

    store
        .cleanup_prefix(&shared.key_prefix)
        .await
        .expect("Failed to cleanup");
}

#[tokio::test]
#[ignore = "requires Redis"]
#[serial]
async fn test_events_reach_clients_on_other_instances() {
    let store = connect().await;
    let config = test_config("redis-events");
    let client = store.redis_client().clone();

    let hub_a = Arc::new(LocalBroadcaster::default());
    let hub_b = Arc::new(LocalBroadcaster::default());
    let relay_a = spawn_relay(
        client.clone(),
        config.keys(),
        hub_a.clone(),
        Duration::from_millis(100),
    );
    let relay_b = spawn_relay(
        client.clone(),
        config.keys(),
        hub_b.clone(),
        Duration::from_millis(100),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut rx_a = hub_a.subscribe("subnet");
    let mut rx_b = hub_b.subscribe("subnet");

    // Instance A publishes; both A's and B's clients hear it
    let publisher = BroadcastAdapter::new(Arc::new(RedisBroadcaster::new(client, config.keys())));
    assert!(
        publisher
            .publish("subnet", EventKind::TimerUpdate, &serde_json::json!({ "timer": 12 }))
            .await
    );

    for rx in [&mut rx_a, &mut rx_b] {
        let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event relayed in time")
            .unwrap();
        assert_eq!(message.event, EventKind::TimerUpdate);
        assert_eq!(message.payload["timer"], 12);
    }

    relay_a.abort();
    relay_b.abort();
}
