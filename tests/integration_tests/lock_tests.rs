use std::sync::Arc;
use std::time::Duration;

use subnet_batcher::models::PrefixedStoreKeys;
use subnet_batcher::services::lock::{BATCH_LOCK, DistributedLock, TIMER_LOCK};
use subnet_batcher::services::store::{MemoryStore, SharedStore};

fn locks(store: &MemoryStore, count: usize) -> Vec<DistributedLock> {
    let store: Arc<dyn SharedStore> = Arc::new(store.clone());
    let keys = PrefixedStoreKeys::new("it:");
    (0..count)
        .map(|i| DistributedLock::new(store.clone(), keys.clone(), format!("instance-{i}")))
        .collect()
}

#[tokio::test]
async fn test_concurrent_acquirers_exactly_one_wins() {
    let store = MemoryStore::new();
    let contenders = locks(&store, 32);

    let handles: Vec<_> = contenders
        .into_iter()
        .map(|lock| {
            tokio::spawn(async move { lock.acquire(BATCH_LOCK, Duration::from_secs(30)).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test(start_paused = true)]
async fn test_lock_self_heals_after_holder_vanishes() {
    let store = MemoryStore::new();
    let [crashed, survivor]: [DistributedLock; 2] = locks(&store, 2).try_into().ok().unwrap();

    assert!(crashed.acquire(BATCH_LOCK, Duration::from_secs(30)).await);
    drop(crashed);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(!survivor.acquire(BATCH_LOCK, Duration::from_secs(30)).await);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(survivor.acquire(BATCH_LOCK, Duration::from_secs(30)).await);
    assert_eq!(
        survivor.holder_of(BATCH_LOCK).await.unwrap().as_deref(),
        Some("instance-1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_extend_only_by_holder() {
    let store = MemoryStore::new();
    let [owner, intruder]: [DistributedLock; 2] = locks(&store, 2).try_into().ok().unwrap();

    assert!(owner.acquire(TIMER_LOCK, Duration::from_secs(5)).await);
    assert!(!intruder.extend(TIMER_LOCK, Duration::from_secs(5)).await);

    // Renewed every few seconds, the lock outlives its original TTL
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(owner.extend(TIMER_LOCK, Duration::from_secs(5)).await);
    }
    assert!(!intruder.acquire(TIMER_LOCK, Duration::from_secs(5)).await);

    // Once it lapses, extending no longer resurrects it
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!owner.extend(TIMER_LOCK, Duration::from_secs(5)).await);
    assert!(intruder.acquire(TIMER_LOCK, Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_release_if_held_leaves_other_holder_alone() {
    let store = MemoryStore::new();
    let [first, second]: [DistributedLock; 2] = locks(&store, 2).try_into().ok().unwrap();

    assert!(first.acquire(TIMER_LOCK, Duration::from_secs(5)).await);
    assert!(!second.release_if_held(TIMER_LOCK).await);
    assert!(first.is_locked(TIMER_LOCK).await.unwrap());

    assert!(first.release_if_held(TIMER_LOCK).await);
    assert!(!first.is_locked(TIMER_LOCK).await.unwrap());
}

#[tokio::test]
async fn test_store_outage_fails_closed_on_acquire() {
    let store = MemoryStore::new();
    let [lock]: [DistributedLock; 1] = locks(&store, 1).try_into().ok().unwrap();

    store.set_failing(true);
    assert!(!lock.acquire(BATCH_LOCK, Duration::from_secs(30)).await);
    assert!(lock.is_locked(BATCH_LOCK).await.is_err());

    store.set_failing(false);
    assert!(lock.acquire(BATCH_LOCK, Duration::from_secs(30)).await);
}
