//! Batch processing state machine
//!
//! One attempt walks `Idle -> Triggering -> Processing -> Idle`. Losing the
//! lock race, or finding the processing flag set, ends the attempt as
//! [`BatchOutcome::Rejected`]; that is the normal outcome on every instance
//! but one.
//!
//! The processing flag and the batch lock guard the same critical section.
//! The flag is the cheap advisory check, the lock is what actually excludes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::coordinator::{CoordinatorConfig, PrefixedStoreKeys};
use crate::models::events::{now_millis, BatchProcessed, BatchResult, EventKind, TriggerReason};
use crate::models::transfer::MineResult;
use crate::services::broadcast::BroadcastAdapter;
use crate::services::engine::ProcessingEngine;
use crate::services::lock::{DistributedLock, BATCH_LOCK, TIMER_RESET_LOCK};
use crate::services::snapshot::SnapshotBuilder;
use crate::services::store::{SetOptions, SharedStore};
use crate::services::timer::BatchTimer;
use crate::services::trigger::{TriggerDecision, TriggerPolicy};
use crate::services::wallets::TrackedWallets;

/// Shared "a batch is being mined" marker
#[derive(Clone)]
pub struct ProcessingFlag {
    store: Arc<dyn SharedStore>,
    keys: PrefixedStoreKeys,
}

impl ProcessingFlag {
    pub fn new(store: Arc<dyn SharedStore>, keys: PrefixedStoreKeys) -> Self {
        Self { store, keys }
    }

    pub async fn is_set(&self) -> Result<bool, String> {
        let raw = self
            .store
            .get(&self.keys.processing_flag())
            .await
            .map_err(|e| format!("Failed to read processing flag: {e}"))?;
        Ok(raw.as_deref() == Some("true"))
    }

    /// Raise the flag; it expires after `ttl` if nobody clears it
    pub async fn set(&self, ttl: Duration) -> Result<(), String> {
        self.store
            .set(&self.keys.processing_flag(), "true", SetOptions::with_ttl(ttl))
            .await
            .map_err(|e| format!("Failed to set processing flag: {e}"))?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), String> {
        self.store
            .set(&self.keys.processing_flag(), "false", SetOptions::default())
            .await
            .map_err(|e| format!("Failed to clear processing flag: {e}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Triggering,
    Processing,
}

impl std::fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchPhase::Idle => write!(f, "idle"),
            BatchPhase::Triggering => write!(f, "triggering"),
            BatchPhase::Processing => write!(f, "processing"),
        }
    }
}

/// Why an attempt backed off without mining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Processing flag was already set
    AlreadyProcessing,
    /// Another holder owns the batch lock
    LockHeld,
    /// Queue length could not be read
    EngineUnavailable,
    /// Processing flag could not be read
    StoreUnavailable,
    /// The attempt task died before finishing
    Aborted,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::AlreadyProcessing => "a batch is already being processed",
            RejectReason::LockHeld => "another instance holds the batch lock",
            RejectReason::EngineUnavailable => "the processing engine is unavailable",
            RejectReason::StoreUnavailable => "the coordination store is unavailable",
            RejectReason::Aborted => "the batch attempt was aborted",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Rejected(RejectReason),
    /// Queue empty and timer not expired, or someone else is already resetting it
    NothingToDo,
    /// Queue empty at zero; countdown restarted
    TimerReset,
    /// Mining was attempted (successfully or not) and the timer re-armed
    Processed(BatchResult),
}

#[derive(Clone)]
pub struct BatchProcessor {
    instance_id: String,
    channel: String,
    policy: TriggerPolicy,
    max_batch_size: usize,
    batch_lock_ttl: Duration,
    timer_reset_lock_ttl: Duration,
    lock: DistributedLock,
    timer: BatchTimer,
    flag: ProcessingFlag,
    engine: Arc<dyn ProcessingEngine>,
    broadcaster: BroadcastAdapter,
    snapshots: SnapshotBuilder,
}

impl BatchProcessor {
    pub fn new(
        config: &CoordinatorConfig,
        store: Arc<dyn SharedStore>,
        engine: Arc<dyn ProcessingEngine>,
        broadcaster: BroadcastAdapter,
    ) -> Self {
        let keys = config.keys();
        let timer = BatchTimer::new(store.clone(), keys.clone(), config.batch_timer_seconds);
        let flag = ProcessingFlag::new(store.clone(), keys.clone());
        let wallets = TrackedWallets::new(store.clone(), keys.clone());
        let snapshots = SnapshotBuilder::new(
            config.instance_id.clone(),
            timer.clone(),
            flag.clone(),
            engine.clone(),
            wallets,
        );

        Self {
            instance_id: config.instance_id.clone(),
            channel: config.broadcast_channel.clone(),
            policy: TriggerPolicy {
                zero_threshold: config.zero_threshold,
                max_queue_length: config.max_queue_length,
            },
            max_batch_size: config.max_batch_size,
            batch_lock_ttl: config.batch_lock_ttl,
            timer_reset_lock_ttl: config.timer_reset_lock_ttl,
            lock: DistributedLock::new(store, keys, config.instance_id.clone()),
            timer,
            flag,
            engine,
            broadcaster,
            snapshots,
        }
    }

    /// Broadcast channel every outcome is published on
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn timer(&self) -> &BatchTimer {
        &self.timer
    }

    pub fn flag(&self) -> &ProcessingFlag {
        &self.flag
    }

    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    pub fn snapshots(&self) -> &SnapshotBuilder {
        &self.snapshots
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    /// Trigger entry point: look at timer and queue, and act if needed
    pub async fn evaluate_and_act(&self) -> BatchOutcome {
        let timer = self.timer.get().await;
        let queue_length = match self.engine.queue_length().await {
            Ok(len) => len,
            Err(e) => {
                tracing::debug!("Skipping trigger evaluation: {}", e);
                return BatchOutcome::Rejected(RejectReason::EngineUnavailable);
            }
        };

        match self.policy.evaluate(timer, queue_length) {
            TriggerDecision::Idle => BatchOutcome::NothingToDo,
            TriggerDecision::ResetTimer => self.process(TriggerReason::TimerExpired).await,
            TriggerDecision::Batch(reason) => {
                tracing::debug!(
                    "Trigger fired ({:?}): timer={}s queue={}",
                    reason,
                    timer,
                    queue_length
                );
                self.process(reason).await
            }
        }
    }

    /// Run one batch attempt to completion.
    ///
    /// The attempt runs on its own task, so dropping this future (client
    /// went away) does not interrupt an attempt that already holds the lock.
    pub async fn process(&self, trigger: TriggerReason) -> BatchOutcome {
        let this = self.clone();
        let attempt = tokio::spawn(async move { this.run_attempt(trigger).await });

        match attempt.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let msg = format!("Batch attempt task failed: {e}");
                tracing::error!("{}", msg);
                sentry::capture_message(&msg, sentry::Level::Error);
                // Flag and lock both carry TTLs and will clear themselves
                BatchOutcome::Rejected(RejectReason::Aborted)
            }
        }
    }

    async fn run_attempt(&self, trigger: TriggerReason) -> BatchOutcome {
        let attempt_id = short_id();
        tracing::debug!("Batch attempt {} ({:?}): {}", attempt_id, trigger, BatchPhase::Triggering);

        // 1. Anything to do?
        let queue_length = match self.engine.queue_length().await {
            Ok(len) => len,
            Err(e) => {
                tracing::warn!("Batch attempt {}: failed to read queue: {}", attempt_id, e);
                return BatchOutcome::Rejected(RejectReason::EngineUnavailable);
            }
        };
        if queue_length == 0 {
            let timer = self.timer.get().await;
            if timer <= 0 {
                return self.reset_empty_timer().await;
            }
            tracing::debug!("Batch attempt {}: queue empty, nothing to do", attempt_id);
            return BatchOutcome::NothingToDo;
        }

        // 2. Someone already mid-flight?
        match self.flag.is_set().await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!("Batch attempt {}: batch already in progress", attempt_id);
                return BatchOutcome::Rejected(RejectReason::AlreadyProcessing);
            }
            Err(e) => {
                tracing::warn!("Batch attempt {}: {}", attempt_id, e);
                return BatchOutcome::Rejected(RejectReason::StoreUnavailable);
            }
        }

        // 3-4. Win the lock or back off
        let lock = self
            .lock
            .for_holder(format!("{}:{}", self.instance_id, attempt_id));
        if !lock.acquire(BATCH_LOCK, self.batch_lock_ttl).await {
            tracing::debug!("Batch attempt {}: lost the batch lock race", attempt_id);
            return BatchOutcome::Rejected(RejectReason::LockHeld);
        }

        // 5. Re-check now that the lock is ours
        match self.flag.is_set().await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!(
                    "Batch attempt {}: flag raised while acquiring the lock",
                    attempt_id
                );
                lock.release(BATCH_LOCK).await;
                return BatchOutcome::Rejected(RejectReason::AlreadyProcessing);
            }
            Err(e) => {
                tracing::warn!("Batch attempt {}: {}", attempt_id, e);
                lock.release(BATCH_LOCK).await;
                return BatchOutcome::Rejected(RejectReason::StoreUnavailable);
            }
        }

        // 6-7. Separate task; a panic there still reaches 8-10
        let started = Instant::now();
        let worker = {
            let this = self.clone();
            let attempt_id = attempt_id.clone();
            tokio::spawn(async move { this.process_locked(trigger, &attempt_id).await })
        };
        let result = match worker.await {
            Ok(result) => result,
            Err(e) => {
                let msg = format!("Batch attempt task failed: {e}");
                tracing::error!("Batch attempt {}: {}", attempt_id, msg);
                sentry::capture_message(&msg, sentry::Level::Error);
                Some(BatchResult {
                    trigger,
                    batch_size: 0,
                    success: false,
                    txid: None,
                    error: Some(msg),
                    reason: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        // 8. Re-arm the countdown whatever happened
        if let Err(e) = self.timer.reset().await {
            tracing::error!("Batch attempt {}: failed to reset timer: {}", attempt_id, e);
        }

        // 9. Flag first, then lock
        self.cleanup().await;
        tracing::debug!("Batch attempt {}: {}", attempt_id, BatchPhase::Idle);

        // 10. Tell everyone, success or not
        match result {
            Some(result) => {
                self.broadcast_result(&result).await;
                BatchOutcome::Processed(result)
            }
            None => {
                tracing::debug!(
                    "Batch attempt {}: queue drained before mining, timer reset",
                    attempt_id
                );
                self.broadcast_timer().await;
                BatchOutcome::NothingToDo
            }
        }
    }

    /// Steps 6-7 under the batch lock. `None` when the queue was already
    /// drained by the time the lock was ours.
    async fn process_locked(&self, trigger: TriggerReason, attempt_id: &str) -> Option<BatchResult> {
        let started = Instant::now();
        tracing::debug!("Batch attempt {}: {}", attempt_id, BatchPhase::Processing);

        if let Err(e) = self.flag.set(self.batch_lock_ttl).await {
            // The lock still excludes other instances
            tracing::warn!("Batch attempt {}: {}", attempt_id, e);
        }

        let (batch_size, mined) = match self.engine.queue_length().await {
            Ok(0) => return None,
            Ok(len) => {
                let batch_size = len.min(self.max_batch_size);
                tracing::info!(
                    "Batch attempt {}: mining {} transfers ({:?})",
                    attempt_id,
                    batch_size,
                    trigger
                );
                (batch_size, self.mine(batch_size).await)
            }
            Err(e) => {
                tracing::warn!("Batch attempt {}: failed to re-read queue: {}", attempt_id, e);
                (0, MineResult::failed(format!("Failed to re-read queue: {e}")))
            }
        };

        let result = BatchResult {
            trigger,
            batch_size,
            success: mined.is_success(),
            txid: mined.txid,
            error: mined.error,
            reason: mined.reason,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if result.success {
            tracing::info!(
                "Batch attempt {}: settled {} transfers in {}ms (txid: {})",
                attempt_id,
                result.batch_size,
                result.duration_ms,
                result.txid.as_deref().unwrap_or("-")
            );
        } else {
            let msg = format!(
                "Batch of {} transfers failed: {}",
                batch_size,
                result
                    .error
                    .as_deref()
                    .or(result.reason.as_deref())
                    .unwrap_or("unknown error")
            );
            tracing::warn!("Batch attempt {}: {}", attempt_id, msg);
            sentry::capture_message(&msg, sentry::Level::Warning);
        }

        Some(result)
    }

    /// Call the engine on a separate task so a panic comes back as an error
    async fn mine(&self, batch_size: usize) -> MineResult {
        let engine = self.engine.clone();
        match tokio::spawn(async move { engine.mine(batch_size).await }).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => MineResult::failed(e),
            Err(e) => MineResult::failed(format!("Mining task failed: {e}")),
        }
    }

    /// Clear the processing flag, then release the batch lock.
    ///
    /// Safe to call any number of times. Returns false if either step could
    /// not reach the store; both expire on their own in that case.
    pub async fn cleanup(&self) -> bool {
        let flag_cleared = match self.flag.clear().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Cleanup: {}", e);
                false
            }
        };
        let released = self.lock.release(BATCH_LOCK).await;
        flag_cleared && released
    }

    /// Restart the countdown when it ran out with nothing queued.
    ///
    /// The short reset lock is left to expire so instances polling right
    /// behind us do not reset again.
    async fn reset_empty_timer(&self) -> BatchOutcome {
        if !self
            .lock
            .acquire(TIMER_RESET_LOCK, self.timer_reset_lock_ttl)
            .await
        {
            tracing::debug!("Timer reset already handled elsewhere");
            return BatchOutcome::NothingToDo;
        }

        if let Err(e) = self.timer.reset().await {
            tracing::warn!("Failed to reset empty-queue timer: {}", e);
            return BatchOutcome::NothingToDo;
        }

        tracing::info!("Queue empty at zero, timer reset to {}s", self.timer.default_value());
        self.broadcast_timer().await;
        BatchOutcome::TimerReset
    }

    async fn broadcast_timer(&self) {
        let snapshot = self.snapshots.build().await;
        self.broadcaster
            .publish(&self.channel, EventKind::TimerUpdate, &snapshot.timer_update())
            .await;
    }

    async fn broadcast_result(&self, result: &BatchResult) {
        let snapshot = self.snapshots.build().await;
        let event = BatchProcessed {
            instance_id: self.instance_id.clone(),
            timestamp_ms: now_millis(),
            result: result.clone(),
            timer: snapshot.timer,
            queue: snapshot.queue,
            queue_length: snapshot.queue_length,
            balances: snapshot.balances,
        };
        self.broadcaster
            .publish(&self.channel, EventKind::BatchProcessed, &event)
            .await;
    }
}

fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
