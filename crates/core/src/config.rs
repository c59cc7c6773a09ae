use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    env_or(key, "").parse().unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_or(key, "").parse().unwrap_or(default)
}

fn env_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_or(key, "").parse().unwrap_or(default_ms))
}

// ── Engine config ─────────────────────────────────────────────

/// Tunable knobs for the queue engine.
///
/// All fields can be adjusted at runtime via [`EngineConfigUpdate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of entries executing concurrently.
    pub max_concurrent: usize,
    /// Global ceiling on tracked entries (queued + processing), across all lanes.
    pub max_queue_size: usize,
    /// Default per-entry execution timeout when the caller supplies none.
    pub request_timeout: Duration,
    /// Maximum execution attempts per entry before it is marked failed.
    pub retry_attempts: u32,
    /// Base delay for exponential retry backoff.
    pub retry_delay: Duration,
    /// Interval between eviction sweeps of the completed/failed stores.
    pub cleanup_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue_size: 1000,
            request_timeout: Duration::from_secs(60),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    ///
    /// Recognized keys: `SCHLEUSE_MAX_CONCURRENT`, `SCHLEUSE_MAX_QUEUE_SIZE`,
    /// `SCHLEUSE_REQUEST_TIMEOUT_MS`, `SCHLEUSE_RETRY_ATTEMPTS`,
    /// `SCHLEUSE_RETRY_DELAY_MS`, `SCHLEUSE_CLEANUP_INTERVAL_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: env_usize("SCHLEUSE_MAX_CONCURRENT", defaults.max_concurrent),
            max_queue_size: env_usize("SCHLEUSE_MAX_QUEUE_SIZE", defaults.max_queue_size),
            request_timeout: env_millis(
                "SCHLEUSE_REQUEST_TIMEOUT_MS",
                defaults.request_timeout.as_millis() as u64,
            ),
            retry_attempts: env_u32("SCHLEUSE_RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_delay: env_millis(
                "SCHLEUSE_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            ),
            cleanup_interval: env_millis(
                "SCHLEUSE_CLEANUP_INTERVAL_MS",
                defaults.cleanup_interval.as_millis() as u64,
            ),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Engine config:");
        tracing::info!("  max_concurrent:   {}", self.max_concurrent);
        tracing::info!("  max_queue_size:   {}", self.max_queue_size);
        tracing::info!("  request_timeout:  {:?}", self.request_timeout);
        tracing::info!("  retry_attempts:   {}", self.retry_attempts);
        tracing::info!("  retry_delay:      {:?}", self.retry_delay);
        tracing::info!("  cleanup_interval: {:?}", self.cleanup_interval);
    }
}

// ── Runtime reconfiguration ───────────────────────────────────

/// Partial config update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigUpdate {
    pub max_concurrent: Option<usize>,
    pub max_queue_size: Option<usize>,
    pub request_timeout: Option<Duration>,
    pub retry_attempts: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub cleanup_interval: Option<Duration>,
}

impl EngineConfigUpdate {
    /// Apply the non-`None` fields onto `config`.
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(v) = self.max_concurrent {
            config.max_concurrent = v;
        }
        if let Some(v) = self.max_queue_size {
            config.max_queue_size = v;
        }
        if let Some(v) = self.request_timeout {
            config.request_timeout = v;
        }
        if let Some(v) = self.retry_attempts {
            config.retry_attempts = v;
        }
        if let Some(v) = self.retry_delay {
            config.retry_delay = v;
        }
        if let Some(v) = self.cleanup_interval {
            config.cleanup_interval = v;
        }
    }

    /// Whether this update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.max_concurrent.is_none()
            && self.max_queue_size.is_none()
            && self.request_timeout.is_none()
            && self.retry_attempts.is_none()
            && self.retry_delay.is_none()
            && self.cleanup_interval.is_none()
    }
}
