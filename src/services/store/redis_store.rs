//! Redis-backed shared store
//!
//! Lets any number of coordinator instances share the timer, locks and
//! processing flag through one Redis deployment.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use super::{SetOptions, SharedStore};

const EXTEND_IF_VALUE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("pexpire", KEYS[1], ARGV[2])
    else
        return 0
    end
"#;

const DELETE_IF_VALUE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

/// Redis implementation of [`SharedStore`]
#[derive(Clone)]
pub struct RedisStore {
    redis: redis::Client,
}

impl RedisStore {
    /// Open a client without touching the network.
    ///
    /// Only the URL is validated; connectivity problems surface on first use.
    pub fn open(redis_url: &str) -> Result<Self, String> {
        let redis =
            redis::Client::open(redis_url).map_err(|e| format!("Invalid Redis URL: {e}"))?;
        Ok(Self { redis })
    }

    /// Open a client and verify the connection with PING
    pub async fn connect(redis_url: &str) -> Result<Self, String> {
        let redis = redis::Client::open(redis_url)
            .map_err(|e| format!("Failed to connect to Redis: {e}"))?;

        let store = Self { redis };
        store.ping().await?;

        tracing::info!("Shared store connected to Redis at {}", redis_url);

        Ok(store)
    }

    /// Get the Redis client (for the pub/sub relay)
    pub fn redis_client(&self) -> &redis::Client {
        &self.redis
    }

    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection, String> {
        self.redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| format!("Redis connection failed: {e}"))
    }

    /// Delete every key under `prefix`
    ///
    /// Test teardown only. Uses KEYS, which is fine for small test keyspaces.
    pub async fn cleanup_prefix(&self, prefix: &str) -> Result<(), String> {
        let mut conn = self.get_conn().await?;
        let pattern = format!("{prefix}*");

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .map_err(|e| format!("Failed to scan keys: {e}"))?;

        if !keys.is_empty() {
            tracing::debug!("Cleaning up {} Redis keys with prefix '{}'", keys.len(), prefix);
            let _: () = redis::cmd("DEL")
                .arg(&keys)
                .query_async(&mut conn)
                .await
                .map_err(|e| format!("Failed to delete keys: {e}"))?;
        }

        Ok(())
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        let mut conn = self.get_conn().await?;
        conn.get(key)
            .await
            .map_err(|e| format!("Failed to get {key}: {e}"))
    }

    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<bool, String> {
        let mut conn = self.get_conn().await?;

        // SET key value [NX] [PX milliseconds]
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if opts.only_if_absent {
            cmd.arg("NX");
        }
        if let Some(ttl) = opts.ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }

        // NX returns nil when the key already exists
        let result: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| format!("Failed to set {key}: {e}"))?;

        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let mut conn = self.get_conn().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| format!("Failed to delete {key}: {e}"))?;
        Ok(removed > 0)
    }

    async fn decrement(&self, key: &str) -> Result<i64, String> {
        let mut conn = self.get_conn().await?;
        conn.decr(key, 1)
            .await
            .map_err(|e| format!("Failed to decrement {key}: {e}"))
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), String> {
        let mut conn = self.get_conn().await?;
        let _: i64 = conn
            .sadd(set_key, member)
            .await
            .map_err(|e| format!("Failed to add {member} to {set_key}: {e}"))?;
        Ok(())
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), String> {
        let mut conn = self.get_conn().await?;
        let _: i64 = conn
            .srem(set_key, member)
            .await
            .map_err(|e| format!("Failed to remove {member} from {set_key}: {e}"))?;
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, String> {
        let mut conn = self.get_conn().await?;
        conn.smembers(set_key)
            .await
            .map_err(|e| format!("Failed to list members of {set_key}: {e}"))
    }

    async fn extend_if_value(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, String> {
        let mut conn = self.get_conn().await?;

        let extended: i32 = redis::Script::new(EXTEND_IF_VALUE_SCRIPT)
            .key(key)
            .arg(expected)
            .arg(ttl.as_millis().max(1) as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| format!("Failed to extend {key}: {e}"))?;

        Ok(extended == 1)
    }

    async fn delete_if_value(&self, key: &str, expected: &str) -> Result<bool, String> {
        let mut conn = self.get_conn().await?;

        let deleted: i32 = redis::Script::new(DELETE_IF_VALUE_SCRIPT)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| format!("Failed to delete {key}: {e}"))?;

        Ok(deleted == 1)
    }

    async fn ping(&self) -> Result<(), String> {
        let mut conn = self.get_conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| format!("Redis ping failed: {e}"))?;
        Ok(())
    }
}
