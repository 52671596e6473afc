//! In-memory processing engine for tests
//!
//! Keeps a real queue and balance map, and lets tests script what each
//! `mine` call does.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::ProcessingEngine;
use crate::models::transfer::{Balances, MineResult, TransferRequest};

/// What the next `mine` call does
#[derive(Debug, Clone)]
pub enum MockMineBehavior {
    /// Settle the batch and report this txid
    Succeed(String),
    /// Return a result carrying an error marker, queue untouched
    Fail(String),
    /// Return `Err`, as a transport failure would
    Error(String),
    /// Panic inside the engine
    Panic(String),
}

/// What happens on a chosen `queue` read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueReadFault {
    /// Panic inside the engine
    Panic,
    /// Empty the queue just before answering, as a concurrent settlement would
    Drain,
}

#[derive(Debug, Default)]
struct MockState {
    queue: Vec<TransferRequest>,
    balances: Balances,
    scripted: VecDeque<MockMineBehavior>,
    default_behavior: Option<MockMineBehavior>,
    mine_calls: Vec<usize>,
    mine_delay: Option<Duration>,
    unavailable: bool,
    batches_settled: u64,
    queue_reads: usize,
    queue_read_fault: Option<(usize, QueueReadFault)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn available(&self) -> Result<MutexGuard<'_, MockState>, String> {
        let state = self.state();
        if state.unavailable {
            return Err("Mock engine unavailable".to_string());
        }
        Ok(state)
    }

    /// Queue `count` distinct transfers directly
    pub fn seed_queue(&self, count: usize) {
        let mut state = self.state();
        for i in 0..count {
            state.queue.push(TransferRequest {
                from: format!("wallet-{}", i % 3),
                to: format!("wallet-{}", (i % 3) + 3),
                amount: 1,
                nonce: i as u64,
                signature: format!("sig-{i}"),
            });
        }
    }

    pub fn set_balance(&self, address: &str, amount: u64) {
        self.state().balances.insert(address.to_string(), amount);
    }

    /// Queue up behaviors for the next `mine` calls, in order
    pub fn script(&self, behaviors: impl IntoIterator<Item = MockMineBehavior>) {
        self.state().scripted.extend(behaviors);
    }

    /// Behavior once the script runs out (defaults to succeeding)
    pub fn set_default_behavior(&self, behavior: MockMineBehavior) {
        self.state().default_behavior = Some(behavior);
    }

    /// Make every `mine` call take this long
    pub fn set_mine_delay(&self, delay: Duration) {
        self.state().mine_delay = Some(delay);
    }

    /// Make every call fail (simulates an unreachable engine)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Apply `fault` on the `nth` queue read (1-based, counted from now)
    pub fn fault_queue_read(&self, nth: usize, fault: QueueReadFault) {
        let mut state = self.state();
        let at = state.queue_reads + nth;
        state.queue_read_fault = Some((at, fault));
    }

    /// `max_count` of every `mine` call so far
    pub fn mine_calls(&self) -> Vec<usize> {
        self.state().mine_calls.clone()
    }

    pub fn batches_settled(&self) -> u64 {
        self.state().batches_settled
    }

    fn next_behavior(state: &mut MockState) -> MockMineBehavior {
        state.scripted.pop_front().unwrap_or_else(|| {
            state
                .default_behavior
                .clone()
                .unwrap_or_else(|| MockMineBehavior::Succeed(format!("0x{:064x}", state.batches_settled + 1)))
        })
    }

    fn settle(state: &mut MockState, max_count: usize) {
        let count = max_count.min(state.queue.len());
        let batch: Vec<TransferRequest> = state.queue.drain(..count).collect();
        for transfer in batch {
            let from = state.balances.entry(transfer.from.clone()).or_insert(0);
            *from = from.saturating_sub(transfer.amount);
            let to = state.balances.entry(transfer.to.clone()).or_insert(0);
            *to = to.saturating_add(transfer.amount);
        }
        state.batches_settled += 1;
    }
}

#[async_trait]
impl ProcessingEngine for MockEngine {
    async fn enqueue(&self, request: TransferRequest) -> Result<usize, String> {
        let mut state = self.available()?;
        state.queue.push(request);
        Ok(state.queue.len())
    }

    async fn queue(&self) -> Result<Vec<TransferRequest>, String> {
        let fault = {
            let mut state = self.available()?;
            state.queue_reads += 1;
            match state.queue_read_fault {
                Some((at, fault)) if at == state.queue_reads => Some(fault),
                _ => None,
            }
        };

        match fault {
            Some(QueueReadFault::Panic) => panic!("queue read failed inside the engine"),
            Some(QueueReadFault::Drain) => {
                self.state().queue.clear();
                Ok(Vec::new())
            }
            None => Ok(self.available()?.queue.clone()),
        }
    }

    async fn mine(&self, max_count: usize) -> Result<MineResult, String> {
        let (behavior, delay) = {
            let mut state = self.available()?;
            state.mine_calls.push(max_count);
            (Self::next_behavior(&mut state), state.mine_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match behavior {
            MockMineBehavior::Succeed(txid) => {
                Self::settle(&mut self.state(), max_count);
                Ok(MineResult::succeeded(txid))
            }
            MockMineBehavior::Fail(error) => Ok(MineResult::failed(error)),
            MockMineBehavior::Error(error) => Err(error),
            MockMineBehavior::Panic(message) => panic!("{message}"),
        }
    }

    async fn balances(&self) -> Result<Balances, String> {
        Ok(self.available()?.balances.clone())
    }

    async fn clear_queue(&self) -> Result<usize, String> {
        let mut state = self.available()?;
        let cleared = state.queue.len();
        state.queue.clear();
        Ok(cleared)
    }
}
