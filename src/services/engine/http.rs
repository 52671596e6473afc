//! HTTP client for a remote subnet processing engine

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::ProcessingEngine;
use crate::models::transfer::{Balances, MineResult, TransferRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueResponse {
    queue_length: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MineRequest {
    max_count: usize,
}

#[derive(Debug, Deserialize)]
struct ClearResponse {
    cleared: usize,
}

/// JSON-over-HTTP engine client
#[derive(Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    base_url: String,
    mine_timeout: Duration,
}

impl HttpEngine {
    /// `mine_timeout` bounds a mining call; keep it below the batch lock TTL
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        mine_timeout: Duration,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| format!("Failed to build engine HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mine_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, String> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Engine {what} returned {status}: {body}"));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| format!("Failed to decode engine {what} response: {e}"))
    }
}

#[async_trait]
impl ProcessingEngine for HttpEngine {
    async fn enqueue(&self, request: TransferRequest) -> Result<usize, String> {
        let response = self
            .client
            .post(self.url("/enqueue"))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Failed to reach engine for enqueue: {e}"))?;

        let body: EnqueueResponse = Self::read_json(response, "enqueue").await?;
        Ok(body.queue_length)
    }

    async fn queue(&self) -> Result<Vec<TransferRequest>, String> {
        let response = self
            .client
            .get(self.url("/queue"))
            .send()
            .await
            .map_err(|e| format!("Failed to reach engine for queue: {e}"))?;

        Self::read_json(response, "queue").await
    }

    async fn mine(&self, max_count: usize) -> Result<MineResult, String> {
        let response = self
            .client
            .post(self.url("/mine"))
            .timeout(self.mine_timeout)
            .json(&MineRequest { max_count })
            .send()
            .await
            .map_err(|e| format!("Failed to reach engine for mine: {e}"))?;

        // Failed batches still come back as a MineResult body
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read engine mine response: {e}"))?;

        match serde_json::from_str::<MineResult>(&body) {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => Err(format!("Engine mine returned {status}: {body}")),
            Err(e) => Err(format!("Failed to decode engine mine response: {e}")),
        }
    }

    async fn balances(&self) -> Result<Balances, String> {
        let response = self
            .client
            .get(self.url("/balances"))
            .send()
            .await
            .map_err(|e| format!("Failed to reach engine for balances: {e}"))?;

        Self::read_json(response, "balances").await
    }

    async fn clear_queue(&self) -> Result<usize, String> {
        let response = self
            .client
            .post(self.url("/clear"))
            .send()
            .await
            .map_err(|e| format!("Failed to reach engine for clear: {e}"))?;

        let body: ClearResponse = Self::read_json(response, "clear").await?;
        Ok(body.cleared)
    }
}
