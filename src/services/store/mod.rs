//! Shared coordination store
//!
//! The store is the only medium instances coordinate through. Every
//! operation may fail transiently; callers decide what a failure means
//! (usually "assume the unfavorable outcome and retry on the next tick").

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use std::time::Duration;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Options for [`SharedStore::set`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expire the key after this long
    pub ttl: Option<Duration>,
    /// Only write if the key does not exist yet
    pub only_if_absent: bool,
}

impl SetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            only_if_absent: false,
        }
    }

    /// Conditional write with expiry, the primitive locks are built on
    pub fn if_absent_with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            only_if_absent: true,
        }
    }

    pub fn if_absent() -> Self {
        Self {
            ttl: None,
            only_if_absent: true,
        }
    }
}

/// Key/value store with per-key expiry, atomic decrement and conditional writes
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, String>;

    /// Returns true when the value was written (false only for a refused conditional write)
    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<bool, String>;

    /// Returns true when a key was removed
    async fn delete(&self, key: &str) -> Result<bool, String>;

    /// Atomic decrement by one; a missing key counts as zero
    async fn decrement(&self, key: &str) -> Result<i64, String>;

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), String>;

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), String>;

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, String>;

    /// Reset the expiry of `key` only while it still holds `expected`
    async fn extend_if_value(&self, key: &str, expected: &str, ttl: Duration)
    -> Result<bool, String>;

    /// Delete `key` only while it still holds `expected`
    async fn delete_if_value(&self, key: &str, expected: &str) -> Result<bool, String>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), String>;
}
