//! Per-subscription coordination loops
//!
//! Every SSE subscription runs a [`CoordinatorSession`]:
//! - timer ownership: win the timer lock, then tick/renew/decrement; retry
//!   slowly while someone else owns it
//! - trigger polling: evaluate trigger conditions on a fixed cadence, so a
//!   stalled timer owner cannot hold batches back
//! - snapshots: publish a full status snapshot on a fixed cadence
//!
//! Sessions share nothing in memory; all coordination goes through the
//! store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::coordinator::CoordinatorConfig;
use crate::models::events::EventKind;
use crate::services::batch::{BatchOutcome, BatchProcessor};
use crate::services::broadcast::BroadcastAdapter;
use crate::services::lock::{DistributedLock, TIMER_LOCK};

#[derive(Debug, Clone, Copy)]
struct SessionTimings {
    timer_lock_ttl: Duration,
    tick_interval: Duration,
    min_decrement_gap: Duration,
    ownership_retry_interval: Duration,
    trigger_poll_interval: Duration,
    snapshot_interval: Duration,
}

/// Starts coordinator sessions for this instance
#[derive(Clone)]
pub struct InstanceCoordinator {
    instance_id: String,
    timings: SessionTimings,
    processor: BatchProcessor,
    broadcaster: BroadcastAdapter,
}

impl InstanceCoordinator {
    pub fn new(
        config: &CoordinatorConfig,
        processor: BatchProcessor,
        broadcaster: BroadcastAdapter,
    ) -> Self {
        Self {
            instance_id: config.instance_id.clone(),
            timings: SessionTimings {
                timer_lock_ttl: config.timer_lock_ttl,
                tick_interval: config.tick_interval,
                min_decrement_gap: config.min_decrement_gap,
                ownership_retry_interval: config.ownership_retry_interval,
                trigger_poll_interval: config.trigger_poll_interval,
                snapshot_interval: config.snapshot_interval,
            },
            processor,
            broadcaster,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Spawn the loops for one subscription.
    ///
    /// Every session publishes on the processor's configured channel, so all
    /// clients see the same settlement state. The loops run until the
    /// returned session is dropped.
    pub fn start_session(&self) -> CoordinatorSession {
        let channel = self.processor.channel().to_string();
        let session_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let holder = format!("{}:{}", self.instance_id, session_id);
        let timer_lock = self.processor.lock().for_holder(holder);
        let owns_timer = Arc::new(AtomicBool::new(false));

        let ctx = SessionContext {
            session_id: session_id.clone(),
            channel: channel.clone(),
            timings: self.timings,
            timer_lock: timer_lock.clone(),
            owns_timer: owns_timer.clone(),
            processor: self.processor.clone(),
            broadcaster: self.broadcaster.clone(),
        };

        let tasks = vec![
            tokio::spawn(ctx.clone().timer_ownership_loop()),
            tokio::spawn(ctx.clone().trigger_poll_loop()),
            tokio::spawn(ctx.snapshot_loop()),
        ];

        tracing::info!(
            "Started coordinator session {} on channel '{}'",
            session_id,
            channel
        );

        CoordinatorSession {
            session_id,
            channel,
            timer_lock,
            owns_timer,
            tasks,
        }
    }
}

/// Handle to a running session; dropping it tears the session down
pub struct CoordinatorSession {
    session_id: String,
    channel: String,
    timer_lock: DistributedLock,
    owns_timer: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CoordinatorSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Lock value this session writes when it owns the timer
    pub fn holder(&self) -> &str {
        self.timer_lock.holder()
    }

    pub fn is_timer_owner(&self) -> bool {
        self.owns_timer.load(Ordering::SeqCst)
    }
}

impl Drop for CoordinatorSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("Stopped coordinator session {}", self.session_id);

        if !self.owns_timer.swap(false, Ordering::SeqCst) {
            return;
        }

        // Hand the timer over now instead of waiting for the TTL
        let lock = self.timer_lock.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if lock.release_if_held(TIMER_LOCK).await {
                        tracing::debug!("Timer lock released by {}", lock.holder());
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    "No runtime to release timer lock held by {}, leaving it to expire",
                    self.timer_lock.holder()
                );
            }
        }
    }
}

#[derive(Clone)]
struct SessionContext {
    session_id: String,
    channel: String,
    timings: SessionTimings,
    timer_lock: DistributedLock,
    owns_timer: Arc<AtomicBool>,
    processor: BatchProcessor,
    broadcaster: BroadcastAdapter,
}

impl SessionContext {
    async fn timer_ownership_loop(self) {
        loop {
            if self
                .timer_lock
                .acquire(TIMER_LOCK, self.timings.timer_lock_ttl)
                .await
            {
                self.owns_timer.store(true, Ordering::SeqCst);
                tracing::info!("Session {} is now the timer owner", self.session_id);

                self.run_timer_owner().await;

                self.owns_timer.store(false, Ordering::SeqCst);
                tracing::info!("Session {} lost timer ownership", self.session_id);
            }
            tokio::time::sleep(self.timings.ownership_retry_interval).await;
        }
    }

    /// Tick until the timer lock can no longer be renewed
    async fn run_timer_owner(&self) {
        let mut ticker = tokio::time::interval(self.timings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_decrement: Option<Instant> = None;
        let mut evaluation: Option<JoinHandle<BatchOutcome>> = None;

        loop {
            ticker.tick().await;

            if !self
                .timer_lock
                .extend(TIMER_LOCK, self.timings.timer_lock_ttl)
                .await
            {
                return;
            }

            if last_decrement.is_some_and(|at| at.elapsed() < self.timings.min_decrement_gap) {
                continue;
            }

            let remaining = match self.processor.timer().decrement_once().await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Session {}: timer tick skipped: {}", self.session_id, e);
                    continue;
                }
            };
            last_decrement = Some(Instant::now());
            tracing::trace!("Session {}: timer at {}s", self.session_id, remaining);

            let snapshot = self.processor.snapshots().build().await;
            self.broadcaster
                .publish(&self.channel, EventKind::TimerUpdate, &snapshot.timer_update())
                .await;

            if !self.processor.policy().timer_expired(remaining) {
                continue;
            }

            // One evaluation at a time; mining can outlast many ticks
            if evaluation.as_ref().is_some_and(|handle| !handle.is_finished()) {
                continue;
            }
            let processor = self.processor.clone();
            evaluation = Some(tokio::spawn(async move { processor.evaluate_and_act().await }));
        }
    }

    async fn trigger_poll_loop(self) {
        let mut ticker = tokio::time::interval(self.timings.trigger_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.processor.evaluate_and_act().await {
                BatchOutcome::Processed(result) => tracing::debug!(
                    "Session {} processed a batch of {} (success: {})",
                    self.session_id,
                    result.batch_size,
                    result.success
                ),
                BatchOutcome::Rejected(reason) => {
                    tracing::trace!("Session {}: trigger rejected, {}", self.session_id, reason)
                }
                BatchOutcome::NothingToDo | BatchOutcome::TimerReset => {}
            }
        }
    }

    async fn snapshot_loop(self) {
        let mut ticker = tokio::time::interval(self.timings.snapshot_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let snapshot = self.processor.snapshots().build().await;
            self.broadcaster
                .publish(&self.channel, EventKind::Status, &snapshot)
                .await;
        }
    }
}
