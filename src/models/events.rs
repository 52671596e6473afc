//! Broadcast payloads
//!
//! Every payload is a complete snapshot of its kind. Clients replace their
//! state with the latest one received and never merge payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::transfer::{Balances, TransferRequest};

/// Event names carried on the broadcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Timer/queue/balance snapshot
    TimerUpdate,
    /// Queue-only update after an enqueue
    TransactionAdded,
    /// Settlement outcome
    BatchProcessed,
    /// Combined periodic status tick
    Status,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TimerUpdate => "timer-update",
            EventKind::TransactionAdded => "transaction-added",
            EventKind::BatchProcessed => "batch-processed",
            EventKind::Status => "status",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a batch attempt was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Countdown reached (or came within the threshold of) zero with work queued
    TimerExpired,
    /// Queue reached the configured maximum length
    QueueFull,
    /// Administrative request
    Manual,
}

/// Health of the dependencies behind a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SystemStatus {
    Healthy,
    Degraded { reason: String },
}

impl SystemStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, SystemStatus::Healthy)
    }
}

/// Full status snapshot published on every snapshot tick
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub instance_id: String,
    pub timestamp_ms: u64,
    pub timer: i64,
    pub timer_default: i64,
    pub last_batch_time_ms: Option<u64>,
    pub is_processing_batch: bool,
    pub queue: Vec<TransferRequest>,
    pub queue_length: usize,
    pub balances: Balances,
    pub tracked_wallets: Vec<String>,
    pub status: SystemStatus,
}

impl StatusSnapshot {
    /// The timer/queue/balance subset published as `timer-update`
    pub fn timer_update(&self) -> TimerUpdate {
        TimerUpdate {
            instance_id: self.instance_id.clone(),
            timestamp_ms: self.timestamp_ms,
            timer: self.timer,
            queue_length: self.queue_length,
            balances: self.balances.clone(),
            is_processing_batch: self.is_processing_batch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdate {
    pub instance_id: String,
    pub timestamp_ms: u64,
    pub timer: i64,
    pub queue_length: usize,
    pub balances: Balances,
    pub is_processing_batch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAdded {
    pub instance_id: String,
    pub timestamp_ms: u64,
    pub transaction: TransferRequest,
    pub queue: Vec<TransferRequest>,
    pub queue_length: usize,
}

/// Outcome of one batch attempt that reached the mining step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub trigger: TriggerReason,
    pub batch_size: usize,
    pub success: bool,
    pub txid: Option<String>,
    pub error: Option<String>,
    pub reason: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessed {
    pub instance_id: String,
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub result: BatchResult,
    pub timer: i64,
    pub queue: Vec<TransferRequest>,
    pub queue_length: usize,
    pub balances: Balances,
}

/// Milliseconds since the unix epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
