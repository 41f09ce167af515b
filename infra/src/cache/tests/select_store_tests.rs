//! Tests for store backend selection

use otp_shared::config::{CacheConfig, StoreBackendPolicy};

use crate::cache::{select_store, StorageBackend};

fn unreachable_config(backend: StoreBackendPolicy) -> CacheConfig {
    CacheConfig {
        connection_timeout_seconds: 1,
        max_retries: 1,
        retry_delay_ms: 10,
        memory_shards: 4,
        ..CacheConfig::new("redis://127.0.0.1:1/0")
    }
    .with_backend(backend)
}

#[tokio::test]
async fn test_fail_closed_returns_error() {
    let result = select_store(&unreachable_config(StoreBackendPolicy::FailClosed)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_fallback_selects_memory_store() {
    let selected = select_store(&unreachable_config(StoreBackendPolicy::FallbackToMemory))
        .await
        .unwrap();

    assert_eq!(selected.backend, StorageBackend::Memory);
    assert_eq!(selected.store.backend_name(), "memory");
    assert!(selected.store.ping().await.is_ok());
}

#[test]
fn test_backend_display() {
    assert_eq!(StorageBackend::Redis.to_string(), "redis");
    assert_eq!(StorageBackend::Memory.to_string(), "memory");
}
