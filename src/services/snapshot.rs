//! Builds the full status snapshot clients render from.
//!
//! Never fails: an unreachable dependency is reported through
//! [`SystemStatus::Degraded`] and replaced with an empty/default value.

use std::sync::Arc;

use crate::models::events::{now_millis, StatusSnapshot, SystemStatus};
use crate::models::transfer::Balances;
use crate::services::batch::ProcessingFlag;
use crate::services::engine::ProcessingEngine;
use crate::services::timer::BatchTimer;
use crate::services::wallets::TrackedWallets;

#[derive(Clone)]
pub struct SnapshotBuilder {
    instance_id: String,
    timer: BatchTimer,
    flag: ProcessingFlag,
    engine: Arc<dyn ProcessingEngine>,
    wallets: TrackedWallets,
}

impl SnapshotBuilder {
    pub fn new(
        instance_id: String,
        timer: BatchTimer,
        flag: ProcessingFlag,
        engine: Arc<dyn ProcessingEngine>,
        wallets: TrackedWallets,
    ) -> Self {
        Self {
            instance_id,
            timer,
            flag,
            engine,
            wallets,
        }
    }

    pub async fn build(&self) -> StatusSnapshot {
        let mut problems: Vec<String> = Vec::new();

        let timer = self.timer.try_get().await.unwrap_or_else(|e| {
            problems.push(e);
            self.timer.default_value()
        });
        let last_batch_time_ms = self.timer.last_batch_time().await.unwrap_or_else(|e| {
            problems.push(e);
            None
        });
        let is_processing_batch = self.flag.is_set().await.unwrap_or_else(|e| {
            problems.push(e);
            false
        });
        let queue = self.engine.queue().await.unwrap_or_else(|e| {
            problems.push(e);
            Vec::new()
        });
        let balances = self.engine.balances().await.unwrap_or_else(|e| {
            problems.push(e);
            Balances::new()
        });
        let tracked_wallets = self.wallets.list().await.unwrap_or_else(|e| {
            problems.push(e);
            Vec::new()
        });

        let status = if problems.is_empty() {
            SystemStatus::Healthy
        } else {
            tracing::warn!("Status snapshot degraded: {}", problems.join("; "));
            SystemStatus::Degraded {
                reason: problems.join("; "),
            }
        };

        StatusSnapshot {
            instance_id: self.instance_id.clone(),
            timestamp_ms: now_millis(),
            timer,
            timer_default: self.timer.default_value(),
            last_batch_time_ms,
            is_processing_batch,
            queue_length: queue.len(),
            queue,
            balances: merge_tracked_wallets(balances, &tracked_wallets),
            tracked_wallets,
            status,
        }
    }
}

/// Tracked wallets missing from `balances` show up with a zero balance
pub fn merge_tracked_wallets(mut balances: Balances, tracked: &[String]) -> Balances {
    for address in tracked {
        balances.entry(address.clone()).or_insert(0);
    }
    balances
}
