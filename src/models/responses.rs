use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::events::BatchResult;
use super::transfer::TransferRequest;
use crate::services::batch::BatchOutcome;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnqueueResponse {
    pub transaction: TransferRequest,
    pub queue_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClearQueueResponse {
    pub cleared: usize,
    pub timer: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrackedWallet {
    pub address: String,
    pub last_seen_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WalletListResponse {
    pub wallets: Vec<TrackedWallet>,
}

/// How a batch attempt ended, as reported to HTTP callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcomeKind {
    Rejected,
    NothingToDo,
    TimerReset,
    Processed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchOutcomeResponse {
    pub outcome: BatchOutcomeKind,
    /// Why the attempt backed off, for rejected attempts
    pub reason: Option<String>,
    pub result: Option<BatchResult>,
}

impl BatchOutcomeResponse {
    /// Whether the attempt settled a batch
    pub fn settled(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.success)
    }
}

impl From<BatchOutcome> for BatchOutcomeResponse {
    fn from(outcome: BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::Rejected(reason) => Self {
                outcome: BatchOutcomeKind::Rejected,
                reason: Some(reason.to_string()),
                result: None,
            },
            BatchOutcome::NothingToDo => Self {
                outcome: BatchOutcomeKind::NothingToDo,
                reason: None,
                result: None,
            },
            BatchOutcome::TimerReset => Self {
                outcome: BatchOutcomeKind::TimerReset,
                reason: None,
                result: None,
            },
            BatchOutcome::Processed(result) => Self {
                outcome: BatchOutcomeKind::Processed,
                reason: None,
                result: Some(result),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SettleResponse {
    /// Whether flag and lock were cleared first
    pub forced_unlock: bool,
    pub batch: BatchOutcomeResponse,
}
