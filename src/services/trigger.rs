//! Trigger evaluation: should this instance try to settle a batch now?

use crate::models::events::TriggerReason;

/// Inputs the decision depends on
#[derive(Debug, Clone, Copy)]
pub struct TriggerPolicy {
    /// Timer values at or below this count as expired when work is queued.
    /// Absorbs polling jitter; not a deadline.
    pub zero_threshold: i64,
    /// Queue length that forces a batch regardless of the timer
    pub max_queue_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Nothing to do yet
    Idle,
    /// Timer ran out with nothing queued; restart the countdown
    ResetTimer,
    /// Try to settle a batch
    Batch(TriggerReason),
}

impl TriggerPolicy {
    pub fn evaluate(&self, timer: i64, queue_length: usize) -> TriggerDecision {
        if queue_length >= self.max_queue_length {
            return TriggerDecision::Batch(TriggerReason::QueueFull);
        }
        if queue_length > 0 && timer <= self.zero_threshold {
            return TriggerDecision::Batch(TriggerReason::TimerExpired);
        }
        if queue_length == 0 && timer <= 0 {
            return TriggerDecision::ResetTimer;
        }
        TriggerDecision::Idle
    }

    /// Whether `timer` counts as at/near zero
    pub fn timer_expired(&self, timer: i64) -> bool {
        timer <= self.zero_threshold
    }
}
