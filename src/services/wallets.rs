//! Wallets seen by this deployment, with a last-seen timestamp for pruning

use std::sync::Arc;
use std::time::Duration;

use crate::models::coordinator::PrefixedStoreKeys;
use crate::models::events::now_millis;
use crate::services::store::{SetOptions, SharedStore};

#[derive(Clone)]
pub struct TrackedWallets {
    store: Arc<dyn SharedStore>,
    keys: PrefixedStoreKeys,
}

impl TrackedWallets {
    pub fn new(store: Arc<dyn SharedStore>, keys: PrefixedStoreKeys) -> Self {
        Self { store, keys }
    }

    /// Add `address` to the set and refresh its last-seen time
    pub async fn track(&self, address: &str) -> Result<(), String> {
        let address = address.trim();
        if address.is_empty() {
            return Err("Wallet address is empty".to_string());
        }

        self.store
            .set_add(&self.keys.tracked_wallets(), address)
            .await
            .map_err(|e| format!("Failed to track wallet {address}: {e}"))?;
        self.store
            .set(
                &self.keys.wallet_seen(address),
                &now_millis().to_string(),
                SetOptions::default(),
            )
            .await
            .map_err(|e| format!("Failed to record last-seen for {address}: {e}"))?;

        tracing::debug!("Tracking wallet {}", address);
        Ok(())
    }

    /// Tracked addresses, sorted
    pub async fn list(&self) -> Result<Vec<String>, String> {
        let mut members = self
            .store
            .set_members(&self.keys.tracked_wallets())
            .await
            .map_err(|e| format!("Failed to list tracked wallets: {e}"))?;
        members.sort();
        Ok(members)
    }

    pub async fn last_seen(&self, address: &str) -> Result<Option<u64>, String> {
        let raw = self
            .store
            .get(&self.keys.wallet_seen(address))
            .await
            .map_err(|e| format!("Failed to read last-seen for {address}: {e}"))?;
        Ok(raw.and_then(|v| v.parse::<u64>().ok()))
    }

    /// Drop wallets not seen within `max_age`, returning how many were removed.
    ///
    /// Wallets without a last-seen record count as stale.
    pub async fn prune(&self, max_age: Duration) -> Result<usize, String> {
        let cutoff = now_millis().saturating_sub(max_age.as_millis() as u64);
        let mut removed = 0;

        for address in self.list().await? {
            let stale = match self.last_seen(&address).await? {
                Some(seen) => seen < cutoff || max_age.is_zero(),
                None => true,
            };
            if !stale {
                continue;
            }

            self.store
                .set_remove(&self.keys.tracked_wallets(), &address)
                .await
                .map_err(|e| format!("Failed to untrack wallet {address}: {e}"))?;
            if let Err(e) = self.store.delete(&self.keys.wallet_seen(&address)).await {
                tracing::warn!("Failed to delete last-seen for {}: {}", address, e);
            }
            removed += 1;
        }

        if removed > 0 {
            tracing::info!("Pruned {} stale tracked wallets", removed);
        }
        Ok(removed)
    }
}
