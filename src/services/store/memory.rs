//! In-process shared store
//!
//! Same semantics as the Redis store for a single process: used by tests and
//! by single-instance development setups without Redis. Expiry runs on the
//! tokio clock, so paused-time tests can step over TTLs deterministically.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::{SetOptions, SharedStore};

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory implementation of [`SharedStore`]
///
/// Clones share the same underlying map, so several simulated instances can
/// coordinate through one `MemoryStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    failing: Arc<AtomicBool>,
    operations: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (simulates an unreachable store)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of operations attempted so far, failed ones included
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Remaining time to live of a key, `None` if missing or without expiry
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn begin(&self, op: &str, key: &str) -> Result<MutexGuard<'_, HashMap<String, Entry>>, String> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(format!("Memory store unavailable during {op} {key}"));
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "Memory store mutex poisoned".to_string())?;

        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }

        Ok(entries)
    }
}

fn wrong_type(key: &str) -> String {
    format!("WRONGTYPE operation against key {key} holding the wrong kind of value")
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        let entries = self.begin("GET", key)?;
        match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(StoredValue::Text(value)) => Ok(Some(value.clone())),
            Some(StoredValue::Set(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<bool, String> {
        let mut entries = self.begin("SET", key)?;
        if opts.only_if_absent && entries.contains_key(key) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: StoredValue::Text(value.to_string()),
                expires_at: opts.ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let mut entries = self.begin("DEL", key)?;
        Ok(entries.remove(key).is_some())
    }

    async fn decrement(&self, key: &str) -> Result<i64, String> {
        let mut entries = self.begin("DECR", key)?;
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: StoredValue::Text("0".to_string()),
            expires_at: None,
        });

        let current = match &entry.value {
            StoredValue::Text(raw) => raw
                .parse::<i64>()
                .map_err(|_| format!("Value at {key} is not an integer"))?,
            StoredValue::Set(_) => return Err(wrong_type(key)),
        };

        let next = current - 1;
        entry.value = StoredValue::Text(next.to_string());
        Ok(next)
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), String> {
        let mut entries = self.begin("SADD", set_key)?;
        let entry = entries.entry(set_key.to_string()).or_insert(Entry {
            value: StoredValue::Set(BTreeSet::new()),
            expires_at: None,
        });

        match &mut entry.value {
            StoredValue::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            StoredValue::Text(_) => Err(wrong_type(set_key)),
        }
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), String> {
        let mut entries = self.begin("SREM", set_key)?;
        let now_empty = match entries.get_mut(set_key).map(|e| &mut e.value) {
            None => return Ok(()),
            Some(StoredValue::Set(members)) => {
                members.remove(member);
                members.is_empty()
            }
            Some(StoredValue::Text(_)) => return Err(wrong_type(set_key)),
        };

        // Redis drops empty sets
        if now_empty {
            entries.remove(set_key);
        }
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, String> {
        let entries = self.begin("SMEMBERS", set_key)?;
        match entries.get(set_key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(StoredValue::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(StoredValue::Text(_)) => Err(wrong_type(set_key)),
        }
    }

    async fn extend_if_value(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, String> {
        let mut entries = self.begin("PEXPIRE", key)?;
        match entries.get_mut(key) {
            Some(entry) if matches!(&entry.value, StoredValue::Text(v) if v == expected) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_value(&self, key: &str, expected: &str) -> Result<bool, String> {
        let mut entries = self.begin("DEL", key)?;
        let matches = matches!(
            entries.get(key).map(|e| &e.value),
            Some(StoredValue::Text(v)) if v == expected
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn ping(&self) -> Result<(), String> {
        let _entries = self.begin("PING", "")?;
        Ok(())
    }
}
