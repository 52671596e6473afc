//! Processing engine client
//!
//! The engine owns the transfer queue, balances and the mining algorithm.
//! The coordinator only looks at queue length and the success marker of
//! `mine`.

pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::models::transfer::{Balances, MineResult, TransferRequest};

pub use http::HttpEngine;
pub use mock::{MockEngine, MockMineBehavior, QueueReadFault};

#[async_trait]
pub trait ProcessingEngine: Send + Sync {
    /// Queue a transfer, returning the new queue length
    async fn enqueue(&self, request: TransferRequest) -> Result<usize, String>;

    /// Pending transfers, oldest first
    async fn queue(&self) -> Result<Vec<TransferRequest>, String>;

    /// Settle up to `max_count` queued transfers in one batch
    async fn mine(&self, max_count: usize) -> Result<MineResult, String>;

    async fn balances(&self) -> Result<Balances, String>;

    /// Drop every pending transfer, returning how many were dropped
    async fn clear_queue(&self) -> Result<usize, String>;

    async fn queue_length(&self) -> Result<usize, String> {
        Ok(self.queue().await?.len())
    }
}
