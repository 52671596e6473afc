use std::time::Duration;

/// Configuration for the batch coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Redis connection URL. `None` runs against the in-memory store (single instance only)
    pub redis_url: Option<String>,
    /// Base URL of the subnet processing engine
    pub engine_url: String,
    /// Timeout for engine calls other than `mine` (which is bounded by the batch lock TTL)
    pub engine_timeout: Duration,
    /// Prefix applied to every store key and pub/sub channel
    pub key_prefix: String,
    /// Identifier of this server instance
    pub instance_id: String,
    /// Broadcast channel used by the periodic snapshot loops
    pub broadcast_channel: String,
    /// Value the batch timer is reset to, in seconds
    pub batch_timer_seconds: i64,
    /// Queue length that triggers a batch without waiting for the timer
    pub max_queue_length: usize,
    /// Maximum number of transfers mined in one batch
    pub max_batch_size: usize,
    /// Timer values at or below this count as "at zero" when the queue is non-empty
    pub zero_threshold: i64,
    /// TTL of the timer-ownership lock (renewed every tick)
    pub timer_lock_ttl: Duration,
    /// TTL of the batch lock, must cover a full mining call
    pub batch_lock_ttl: Duration,
    /// TTL of the short-lived lock guarding empty-queue timer resets
    pub timer_reset_lock_ttl: Duration,
    /// How often the timer owner wakes up
    pub tick_interval: Duration,
    /// Minimum real time between two decrements
    pub min_decrement_gap: Duration,
    /// How often a non-owner retries to become timer owner
    pub ownership_retry_interval: Duration,
    /// How often every session evaluates the trigger conditions
    pub trigger_poll_interval: Duration,
    /// How often every session publishes a status snapshot
    pub snapshot_interval: Duration,
    /// Tracked wallets not seen for this long are pruned
    pub wallet_max_age: Duration,
    /// How often the wallet sweep runs
    pub wallet_sweep_interval: Duration,
}

impl CoordinatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let instance_id = match std::env::var("INSTANCE_ID") {
            Ok(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => generate_instance_id(),
        };

        Self {
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            engine_url: std::env::var("SUBNET_ENGINE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            engine_timeout: Duration::from_secs(env_number("ENGINE_TIMEOUT_SECS", 10)?),
            key_prefix: std::env::var("STORE_KEY_PREFIX").unwrap_or_else(|_| "subnet:".to_string()),
            instance_id,
            broadcast_channel: std::env::var("BROADCAST_CHANNEL")
                .unwrap_or_else(|_| "subnet".to_string()),
            batch_timer_seconds: env_number("BATCH_TIMER_SECONDS", 30)? as i64,
            max_queue_length: env_number("MAX_QUEUE_LENGTH", 20)? as usize,
            max_batch_size: env_number("MAX_BATCH_SIZE", 20)? as usize,
            zero_threshold: env_number("TIMER_ZERO_THRESHOLD", 2)? as i64,
            timer_lock_ttl: Duration::from_secs(env_number("TIMER_LOCK_TTL_SECS", 5)?),
            batch_lock_ttl: Duration::from_secs(env_number("BATCH_LOCK_TTL_SECS", 30)?),
            timer_reset_lock_ttl: Duration::from_secs(env_number("TIMER_RESET_LOCK_TTL_SECS", 3)?),
            tick_interval: Duration::from_millis(env_number("TICK_INTERVAL_MS", 500)?),
            min_decrement_gap: Duration::from_millis(env_number("MIN_DECREMENT_GAP_MS", 1000)?),
            ownership_retry_interval: Duration::from_millis(env_number("OWNERSHIP_RETRY_MS", 3000)?),
            trigger_poll_interval: Duration::from_millis(env_number("TRIGGER_POLL_MS", 1000)?),
            snapshot_interval: Duration::from_millis(env_number("SNAPSHOT_INTERVAL_MS", 1000)?),
            wallet_max_age: Duration::from_secs(env_number("WALLET_MAX_AGE_SECS", 86_400)?),
            wallet_sweep_interval: Duration::from_secs(env_number("WALLET_SWEEP_SECS", 300)?),
        }
        .validated()
    }

    /// Reject combinations that would break the coordination guarantees
    pub fn validated(self) -> Result<Self, String> {
        if self.batch_timer_seconds <= 0 {
            return Err(format!(
                "BATCH_TIMER_SECONDS must be positive, got {}",
                self.batch_timer_seconds
            ));
        }
        if self.max_batch_size == 0 {
            return Err("MAX_BATCH_SIZE must be at least 1".to_string());
        }
        if self.max_queue_length == 0 {
            return Err("MAX_QUEUE_LENGTH must be at least 1".to_string());
        }
        if self.zero_threshold < 0 {
            return Err(format!(
                "TIMER_ZERO_THRESHOLD cannot be negative, got {}",
                self.zero_threshold
            ));
        }
        if self.timer_lock_ttl <= self.tick_interval {
            return Err(format!(
                "TIMER_LOCK_TTL_SECS ({:?}) must exceed TICK_INTERVAL_MS ({:?}) or ownership is lost between renewals",
                self.timer_lock_ttl, self.tick_interval
            ));
        }
        if self.engine_timeout.is_zero() {
            return Err("ENGINE_TIMEOUT_SECS must be at least 1".to_string());
        }
        if self.batch_lock_ttl.is_zero() || self.timer_reset_lock_ttl.is_zero() {
            return Err("Lock TTLs must be non-zero".to_string());
        }
        let intervals = [
            ("TICK_INTERVAL_MS", self.tick_interval),
            ("OWNERSHIP_RETRY_MS", self.ownership_retry_interval),
            ("TRIGGER_POLL_MS", self.trigger_poll_interval),
            ("SNAPSHOT_INTERVAL_MS", self.snapshot_interval),
            ("WALLET_SWEEP_SECS", self.wallet_sweep_interval),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, interval)| interval.is_zero()) {
            return Err(format!("{name} must be non-zero"));
        }
        if self.broadcast_channel.is_empty() {
            return Err("BROADCAST_CHANNEL cannot be empty".to_string());
        }
        Ok(self)
    }

    /// Store key generator using this configuration's prefix
    pub fn keys(&self) -> PrefixedStoreKeys {
        PrefixedStoreKeys::new(&self.key_prefix)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            engine_url: "http://127.0.0.1:8080".to_string(),
            engine_timeout: Duration::from_secs(10),
            key_prefix: "subnet:".to_string(),
            instance_id: generate_instance_id(),
            broadcast_channel: "subnet".to_string(),
            batch_timer_seconds: 30,
            max_queue_length: 20,
            max_batch_size: 20,
            zero_threshold: 2,
            timer_lock_ttl: Duration::from_secs(5),
            batch_lock_ttl: Duration::from_secs(30),
            timer_reset_lock_ttl: Duration::from_secs(3),
            tick_interval: Duration::from_millis(500),
            min_decrement_gap: Duration::from_millis(1000),
            ownership_retry_interval: Duration::from_millis(3000),
            trigger_poll_interval: Duration::from_millis(1000),
            snapshot_interval: Duration::from_millis(1000),
            wallet_max_age: Duration::from_secs(86_400),
            wallet_sweep_interval: Duration::from_secs(300),
        }
    }
}

fn env_number(name: &str, default: u64) -> Result<u64, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("{name} must be a non-negative integer, got '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

/// `{hostname}-{short uuid}`, unique per process
pub fn generate_instance_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "instance".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{host}-{}", &suffix[..8])
}

/// Store key generator with configurable prefix for test isolation
///
/// Instances sharing a prefix coordinate with each other; tests pick a unique
/// prefix so they can share one Redis without interfering.
#[derive(Debug, Clone)]
pub struct PrefixedStoreKeys {
    prefix: String,
}

impl PrefixedStoreKeys {
    /// Create a new key generator with the given prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Lock key: lock:{lock_id}
    pub fn lock(&self, lock_id: &str) -> String {
        format!("{}lock:{lock_id}", self.prefix)
    }

    /// Remaining seconds of the shared countdown
    pub fn batch_timer(&self) -> String {
        format!("{}batch_timer", self.prefix)
    }

    /// Unix millis of the last timer reset
    pub fn last_batch_time(&self) -> String {
        format!("{}last_batch_time", self.prefix)
    }

    /// "true" while a batch lock holder is mining
    pub fn processing_flag(&self) -> String {
        format!("{}is_processing_batch", self.prefix)
    }

    /// Set of tracked wallet addresses
    pub fn tracked_wallets(&self) -> String {
        format!("{}tracked_wallets", self.prefix)
    }

    /// Last-seen timestamp of one tracked wallet: wallet_seen:{address}
    pub fn wallet_seen(&self, address: &str) -> String {
        format!("{}wallet_seen:{address}", self.prefix)
    }

    /// Pub/sub channel carrying broadcast events: events:{channel}
    pub fn events_channel(&self, channel: &str) -> String {
        format!("{}events:{channel}", self.prefix)
    }

    /// Pattern matching every events channel under this prefix
    pub fn events_pattern(&self) -> String {
        format!("{}events:*", self.prefix)
    }
}

impl Default for PrefixedStoreKeys {
    fn default() -> Self {
        Self::new("subnet:")
    }
}
