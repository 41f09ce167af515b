//! Key-value store configuration module

use serde::{Deserialize, Serialize};

/// Behaviour when the shared Redis store cannot be reached at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendPolicy {
    /// Refuse to start; requests never run against a process-local store
    FailClosed,
    /// Degrade to the in-memory store (single process only)
    FallbackToMemory,
}

impl Default for StoreBackendPolicy {
    fn default() -> Self {
        StoreBackendPolicy::FailClosed
    }
}

/// Redis store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Redis connection URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,

    /// Maximum attempts for a retriable Redis operation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in milliseconds (doubles on each retry)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// What to do when Redis is unreachable
    #[serde(default)]
    pub backend: StoreBackendPolicy,

    /// Number of lock shards in the in-memory fallback store
    #[serde(default = "default_memory_shards")]
    pub memory_shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connection_timeout_seconds: default_connection_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backend: StoreBackendPolicy::default(),
            memory_shards: default_memory_shards(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the backend policy
    pub fn with_backend(mut self, backend: StoreBackendPolicy) -> Self {
        self.backend = backend;
        self
    }
}

fn default_url() -> String {
    String::from("redis://127.0.0.1:6379/0")
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_memory_shards() -> usize {
    16
}
