use std::time::Duration;

use subnet_batcher::models::{CoordinatorConfig, EventKind, TriggerReason};
use subnet_batcher::services::batch::{BatchOutcome, RejectReason};
use subnet_batcher::services::engine::{MockEngine, MockMineBehavior};
use subnet_batcher::services::lock::BATCH_LOCK;
use subnet_batcher::services::store::MemoryStore;

use crate::test_utils::{SimulatedInstance, test_config};

fn cluster(count: usize, store: &MemoryStore, engine: &MockEngine) -> Vec<SimulatedInstance> {
    let shared = test_config("unused");
    (0..count)
        .map(|i| {
            let config = CoordinatorConfig {
                instance_id: format!("instance-{i}"),
                ..shared.clone()
            };
            SimulatedInstance::new(config, store, engine)
        })
        .collect()
}

#[tokio::test]
async fn test_normal_batch_settles_and_notifies() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    engine.seed_queue(3);
    let instances = cluster(1, &store, &engine);
    let node = &instances[0];
    let mut rx = node.hub.subscribe(&node.config.broadcast_channel);
    node.processor.timer().set(0).await.unwrap();

    let outcome = node.processor.evaluate_and_act().await;

    let BatchOutcome::Processed(result) = outcome else {
        panic!("expected a processed batch, got {outcome:?}");
    };
    assert!(result.success);
    assert_eq!(result.trigger, TriggerReason::TimerExpired);
    assert_eq!(result.batch_size, 3);
    assert_eq!(engine.batches_settled(), 1);
    assert_eq!(node.processor.timer().get().await, 30);
    assert!(node.processor.timer().last_batch_time().await.unwrap().is_some());
    assert!(!node.processor.flag().is_set().await.unwrap());
    assert!(!node.processor.lock().is_locked(BATCH_LOCK).await.unwrap());

    let message = rx.recv().await.unwrap();
    assert_eq!(message.event, EventKind::BatchProcessed);
    assert_eq!(message.payload["success"], true);
    assert_eq!(message.payload["queueLength"], 0);
    assert_eq!(message.payload["timer"], 30);
}

#[tokio::test]
async fn test_batch_size_capped_by_configuration() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    engine.seed_queue(25);
    let instances = cluster(1, &store, &engine);
    let node = &instances[0];
    node.processor.timer().reset().await.unwrap();

    // 25 queued with a cap of 20 mines 20 and leaves 5 behind
    let outcome = node.processor.evaluate_and_act().await;

    assert!(matches!(outcome, BatchOutcome::Processed(ref r) if r.trigger == TriggerReason::QueueFull));
    assert_eq!(engine.mine_calls(), vec![20]);
    assert_eq!(node.processor.snapshots().build().await.queue_length, 5);
}

#[tokio::test]
async fn test_no_double_processing_across_instances() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    engine.seed_queue(3);
    engine.set_mine_delay(Duration::from_millis(200));
    let instances = cluster(5, &store, &engine);
    instances[0].processor.timer().set(0).await.unwrap();

    let handles: Vec<_> = instances
        .iter()
        .map(|node| {
            let processor = node.processor.clone();
            tokio::spawn(async move { processor.evaluate_and_act().await })
        })
        .collect();

    let mut processed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            BatchOutcome::Processed(_) => processed += 1,
            BatchOutcome::Rejected(RejectReason::LockHeld)
            | BatchOutcome::Rejected(RejectReason::AlreadyProcessing)
            | BatchOutcome::NothingToDo
            | BatchOutcome::TimerReset => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(processed, 1);
    assert_eq!(engine.mine_calls(), vec![3]);
    assert_eq!(engine.batches_settled(), 1);
}

#[tokio::test]
async fn test_progress_under_always_failing_mine() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    engine.seed_queue(4);
    engine.set_default_behavior(MockMineBehavior::Fail("engine rejected batch".to_string()));
    let instances = cluster(2, &store, &engine);

    for round in 0..3 {
        let node = &instances[round % 2];
        node.processor.timer().set(0).await.unwrap();

        let outcome = node.processor.evaluate_and_act().await;

        let BatchOutcome::Processed(result) = outcome else {
            panic!("round {round}: expected an attempt, got {outcome:?}");
        };
        assert!(!result.success);
        assert_eq!(node.processor.timer().get().await, 30, "round {round}");
        assert!(!node.processor.flag().is_set().await.unwrap());
        assert!(!node.processor.lock().is_locked(BATCH_LOCK).await.unwrap());
    }

    assert_eq!(engine.mine_calls(), vec![4, 4, 4]);
}

#[tokio::test]
async fn test_progress_under_panicking_engine() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    engine.seed_queue(2);
    engine.script([MockMineBehavior::Panic("engine blew up".to_string())]);
    let instances = cluster(2, &store, &engine);

    instances[0].processor.timer().set(0).await.unwrap();
    let first = instances[0].processor.evaluate_and_act().await;
    assert!(matches!(first, BatchOutcome::Processed(ref r) if !r.success));

    // The next attempt, from another instance, is not blocked
    instances[1].processor.timer().set(0).await.unwrap();
    let second = instances[1].processor.evaluate_and_act().await;
    assert!(matches!(second, BatchOutcome::Processed(ref r) if r.success));
    assert_eq!(engine.mine_calls(), vec![2, 2]);
}

#[tokio::test]
async fn test_empty_queue_at_zero_resets_once() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    let instances = cluster(3, &store, &engine);
    instances[0].processor.timer().set(0).await.unwrap();

    let mut resets = 0;
    for node in &instances {
        match node.processor.evaluate_and_act().await {
            BatchOutcome::TimerReset => resets += 1,
            BatchOutcome::NothingToDo => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(resets, 1);
    assert!(engine.mine_calls().is_empty());
    assert_eq!(instances[2].processor.timer().get().await, 30);
}

#[tokio::test]
async fn test_cleanup_is_idempotent_and_unblocks() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    engine.seed_queue(1);
    let instances = cluster(2, &store, &engine);
    let [crashed, healthy] = [&instances[0], &instances[1]];

    // A crashed attempt left flag and lock behind
    crashed
        .processor
        .flag()
        .set(Duration::from_secs(30))
        .await
        .unwrap();
    assert!(crashed.processor.lock().acquire(BATCH_LOCK, Duration::from_secs(30)).await);

    let blocked = healthy.processor.process(TriggerReason::Manual).await;
    assert_eq!(blocked, BatchOutcome::Rejected(RejectReason::AlreadyProcessing));

    for _ in 0..3 {
        assert!(healthy.processor.cleanup().await);
    }

    let outcome = healthy.processor.process(TriggerReason::Manual).await;
    assert!(matches!(outcome, BatchOutcome::Processed(ref r) if r.success));
}

#[tokio::test]
async fn test_store_outage_rejects_without_mining() {
    let store = MemoryStore::new();
    let engine = MockEngine::new();
    engine.seed_queue(3);
    let instances = cluster(1, &store, &engine);
    let node = &instances[0];

    store.set_failing(true);
    let outcome = node.processor.process(TriggerReason::Manual).await;

    assert_eq!(outcome, BatchOutcome::Rejected(RejectReason::StoreUnavailable));
    assert!(engine.mine_calls().is_empty());
}
