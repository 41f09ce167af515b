//! Cache module for key-value store backends
//!
//! Provides the Redis store used in deployments, the in-memory store used in
//! tests and single-process setups, and the one-time selection between them.

pub mod memory_store;
pub mod redis_store;

#[cfg(test)]
mod tests;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use otp_core::services::KeyValueStore;
use otp_shared::config::{CacheConfig, StoreBackendPolicy};

use crate::InfrastructureError;

/// Backend actually serving the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Redis,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Redis => write!(f, "redis"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Store chosen at startup together with the backend it runs on
pub struct SelectedStore {
    pub store: Arc<dyn KeyValueStore>,
    pub backend: StorageBackend,
}

/// Connect to Redis, applying the configured policy when it is unreachable
///
/// The choice is made once. A store selected here never switches backend
/// afterwards; Redis errors at request time surface as store errors.
pub async fn select_store(config: &CacheConfig) -> Result<SelectedStore, InfrastructureError> {
    match RedisStore::connect(config).await {
        Ok(store) => {
            info!(backend = %StorageBackend::Redis, event = "store_selected", "Using Redis store");
            Ok(SelectedStore {
                store: Arc::new(store),
                backend: StorageBackend::Redis,
            })
        }
        Err(e) => match config.backend {
            StoreBackendPolicy::FailClosed => {
                error!(
                    error = %e,
                    event = "store_unavailable",
                    "Redis unreachable and memory fallback is disabled"
                );
                Err(e)
            }
            StoreBackendPolicy::FallbackToMemory => {
                warn!(
                    error = %e,
                    backend = %StorageBackend::Memory,
                    event = "store_fallback_selected",
                    "Redis unreachable, using single-process memory store"
                );
                Ok(SelectedStore {
                    store: Arc::new(MemoryStore::with_shards(config.memory_shards)),
                    backend: StorageBackend::Memory,
                })
            }
        },
    }
}
