//! Distributed locking on top of the shared store
//!
//! A lock is a key written with a conditional, expiring SET. Holding a lock
//! is inferred from having won the last `acquire`; it can expire at any
//! time, so holders re-validate before acting on it.

use std::sync::Arc;
use std::time::Duration;

use crate::models::coordinator::PrefixedStoreKeys;
use crate::services::store::{SetOptions, SharedStore};

/// Lock held by the instance decrementing the shared countdown
pub const TIMER_LOCK: &str = "timer";
/// Lock held for the whole duration of a batch attempt
pub const BATCH_LOCK: &str = "batch";
/// Short-lived lock guarding the empty-queue timer reset
pub const TIMER_RESET_LOCK: &str = "timer-reset";

/// Named, TTL-bound mutual exclusion shared by every instance
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn SharedStore>,
    keys: PrefixedStoreKeys,
    holder: String,
}

impl DistributedLock {
    /// `holder` is written as the lock value, identifying who won the lock
    pub fn new(store: Arc<dyn SharedStore>, keys: PrefixedStoreKeys, holder: String) -> Self {
        Self {
            store,
            keys,
            holder,
        }
    }

    /// Same store and keys, different holder token
    pub fn for_holder(&self, holder: String) -> Self {
        Self {
            store: self.store.clone(),
            keys: self.keys.clone(),
            holder,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Try to take `lock_id` for `ttl`.
    ///
    /// Only succeeds if nobody holds the lock. Store errors count as "not
    /// acquired".
    pub async fn acquire(&self, lock_id: &str, ttl: Duration) -> bool {
        let key = self.keys.lock(lock_id);
        match self
            .store
            .set(&key, &self.holder, SetOptions::if_absent_with_ttl(ttl))
            .await
        {
            Ok(true) => {
                tracing::info!(
                    "Acquired lock '{}' for {:?} (holder: {})",
                    lock_id,
                    ttl,
                    self.holder
                );
                true
            }
            Ok(false) => {
                tracing::debug!("Lock '{}' is held elsewhere", lock_id);
                false
            }
            Err(e) => {
                tracing::warn!("Failed to acquire lock '{}', treating as held: {}", lock_id, e);
                false
            }
        }
    }

    /// Delete `lock_id` regardless of who holds it.
    ///
    /// Releasing a lock that already expired or was never held is a no-op.
    /// Store errors are logged and reported as `false`; the TTL reclaims
    /// the lock eventually.
    pub async fn release(&self, lock_id: &str) -> bool {
        let key = self.keys.lock(lock_id);
        match self.store.delete(&key).await {
            Ok(removed) => {
                if removed {
                    tracing::info!("Released lock '{}' (holder: {})", lock_id, self.holder);
                } else {
                    tracing::debug!("Lock '{}' was already released or expired", lock_id);
                }
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to release lock '{}', leaving it to expire: {}",
                    lock_id,
                    e
                );
                false
            }
        }
    }

    /// Release only if this holder still owns the lock.
    ///
    /// Token-verified alternative to [`release`](Self::release). The batch
    /// flow keeps the unconditional release.
    pub async fn release_if_held(&self, lock_id: &str) -> bool {
        let key = self.keys.lock(lock_id);
        match self.store.delete_if_value(&key, &self.holder).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!("Failed to release lock '{}': {}", lock_id, e);
                false
            }
        }
    }

    /// Renew the TTL if this holder still owns the lock.
    ///
    /// `false` means ownership is lost (expired, taken over, or the store
    /// could not confirm it).
    pub async fn extend(&self, lock_id: &str, ttl: Duration) -> bool {
        let key = self.keys.lock(lock_id);
        match self.store.extend_if_value(&key, &self.holder, ttl).await {
            Ok(true) => {
                tracing::trace!("Extended lock '{}' to {:?}", lock_id, ttl);
                true
            }
            Ok(false) => {
                tracing::warn!(
                    "Lock '{}' is no longer held by {}",
                    lock_id,
                    self.holder
                );
                false
            }
            Err(e) => {
                tracing::warn!("Failed to extend lock '{}': {}", lock_id, e);
                false
            }
        }
    }

    /// Check if the lock is currently held (by anyone)
    pub async fn is_locked(&self, lock_id: &str) -> Result<bool, String> {
        Ok(self.holder_of(lock_id).await?.is_some())
    }

    /// Get the current lock holder (if any)
    pub async fn holder_of(&self, lock_id: &str) -> Result<Option<String>, String> {
        self.store
            .get(&self.keys.lock(lock_id))
            .await
            .map_err(|e| format!("Failed to get holder of lock '{lock_id}': {e}"))
    }
}
