//! Shared batch countdown
//!
//! The countdown lives in the store. Only the session holding the timer
//! lock calls [`BatchTimer::decrement_once`]; every other caller only reads
//! or resets it.

use std::sync::Arc;

use crate::models::coordinator::PrefixedStoreKeys;
use crate::models::events::now_millis;
use crate::services::store::{SetOptions, SharedStore};

#[derive(Clone)]
pub struct BatchTimer {
    store: Arc<dyn SharedStore>,
    keys: PrefixedStoreKeys,
    default_value: i64,
}

impl BatchTimer {
    pub fn new(store: Arc<dyn SharedStore>, keys: PrefixedStoreKeys, default_value: i64) -> Self {
        Self {
            store,
            keys,
            default_value: default_value.max(0),
        }
    }

    pub fn default_value(&self) -> i64 {
        self.default_value
    }

    /// Write the default value if the timer does not exist yet.
    ///
    /// Returns true when this call created the timer.
    pub async fn initialize(&self) -> Result<bool, String> {
        let created = self
            .store
            .set(
                &self.keys.batch_timer(),
                &self.default_value.to_string(),
                SetOptions::if_absent(),
            )
            .await
            .map_err(|e| format!("Failed to initialize batch timer: {e}"))?;

        if created {
            tracing::info!("Initialized batch timer to {}s", self.default_value);
        }
        Ok(created)
    }

    /// Seconds remaining; the default value if unset or unreadable
    pub async fn get(&self) -> i64 {
        match self.read().await {
            Ok(Some(value)) => value.max(0),
            Ok(None) => self.default_value,
            Err(e) => {
                tracing::warn!("Failed to read batch timer, assuming default: {}", e);
                self.default_value
            }
        }
    }

    /// Like [`get`](Self::get) but surfaces store errors
    pub async fn try_get(&self) -> Result<i64, String> {
        Ok(self
            .read()
            .await?
            .map(|v| v.max(0))
            .unwrap_or(self.default_value))
    }

    /// Set the countdown to `value` seconds (negative values clamp to zero)
    pub async fn set(&self, value: i64) -> Result<(), String> {
        self.store
            .set(
                &self.keys.batch_timer(),
                &value.max(0).to_string(),
                SetOptions::default(),
            )
            .await
            .map_err(|e| format!("Failed to set batch timer: {e}"))?;
        Ok(())
    }

    /// Re-arm the countdown and record the batch time
    pub async fn reset(&self) -> Result<(), String> {
        self.set(self.default_value).await?;
        self.store
            .set(
                &self.keys.last_batch_time(),
                &now_millis().to_string(),
                SetOptions::default(),
            )
            .await
            .map_err(|e| format!("Failed to record last batch time: {e}"))?;

        tracing::debug!("Batch timer reset to {}s", self.default_value);
        Ok(())
    }

    /// Decrement by one second, never going below zero.
    ///
    /// At zero this returns 0 without touching the store.
    pub async fn decrement_once(&self) -> Result<i64, String> {
        let current = match self.read().await? {
            Some(value) => value,
            None => {
                self.initialize().await?;
                self.default_value
            }
        };

        if current <= 0 {
            return Ok(0);
        }

        let next = self
            .store
            .decrement(&self.keys.batch_timer())
            .await
            .map_err(|e| format!("Failed to decrement batch timer: {e}"))?;

        if next < 0 {
            // Raced with another writer past zero
            self.set(0).await?;
            return Ok(0);
        }
        Ok(next)
    }

    /// Unix millis of the last reset, if any
    pub async fn last_batch_time(&self) -> Result<Option<u64>, String> {
        let raw = self
            .store
            .get(&self.keys.last_batch_time())
            .await
            .map_err(|e| format!("Failed to read last batch time: {e}"))?;
        Ok(raw.and_then(|v| v.parse::<u64>().ok()))
    }

    async fn read(&self) -> Result<Option<i64>, String> {
        let raw = self
            .store
            .get(&self.keys.batch_timer())
            .await
            .map_err(|e| format!("Failed to read batch timer: {e}"))?;

        match raw {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| format!("Batch timer holds a non-integer value '{value}': {e}")),
        }
    }
}
