//! In-process key-value store
//!
//! Single-process only: two processes each holding a `MemoryStore` see
//! different codes and counters. Expired entries are dropped when their key
//! is touched, and every `sweep_interval` operations the touched shard is
//! swept, so keys that are never read again do not accumulate. Selected explicitly through
//! [`StoreBackendPolicy::FallbackToMemory`] or constructed directly in tests.
//!
//! [`StoreBackendPolicy::FallbackToMemory`]: otp_shared::config::StoreBackendPolicy

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use otp_core::errors::{StoreError, StoreResult};
use otp_core::services::{KeyTtl, KeyValueStore};

/// Default number of lock shards
pub const DEFAULT_SHARDS: usize = 16;

/// Default number of operations between two shard sweeps
pub const DEFAULT_SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl_seconds: u64, now: Instant) -> Self {
        Self {
            value,
            expires_at: expiry_from(now, ttl_seconds),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

type Shard = HashMap<String, Entry>;

/// Sharded in-memory store with lazy expiry
///
/// Every operation holds its shard lock for the whole read-check-write
/// sequence, so `increment`, `set_if_absent_with_expiry` and `take` are
/// atomic. Expiry is measured with `tokio::time::Instant`.
pub struct MemoryStore {
    shards: Vec<Mutex<Shard>>,
    operations: AtomicU64,
    sweep_interval: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a store with `shards` lock shards (at least one)
    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
            operations: AtomicU64::new(0),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Sweep the touched shard every `operations` operations (at least one)
    pub fn with_sweep_interval(mut self, operations: u64) -> Self {
        self.sweep_interval = operations.max(1);
        self
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .filter_map(|shard| shard.lock().ok())
            .map(|shard| shard.values().filter(|e| !e.is_expired(now)).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            if let Ok(mut shard) = shard.lock() {
                let before = shard.len();
                shard.retain(|_, entry| !entry.is_expired(now));
                removed += before - shard.len();
            }
        }
        removed
    }

    /// Entries held, expired ones included
    pub(crate) fn stored_entries(&self) -> usize {
        self.shards
            .iter()
            .filter_map(|shard| shard.lock().ok())
            .map(|shard| shard.len())
            .sum()
    }

    fn shard_for(&self, key: &str) -> StoreResult<MutexGuard<'_, Shard>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        self.shards[index].lock().map_err(|_| StoreError::Backend {
            message: "memory store shard lock poisoned".to_string(),
        })
    }

    /// Run `f` against the shard owning `key`, after dropping the key if expired
    fn with_entry<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Shard, Instant) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let now = Instant::now();
        let mut shard = self.shard_for(key)?;
        let operation = self.operations.fetch_add(1, Ordering::Relaxed) + 1;
        if operation % self.sweep_interval == 0 {
            shard.retain(|_, entry| !entry.is_expired(now));
        } else if shard.get(key).is_some_and(|entry| entry.is_expired(now)) {
            shard.remove(key);
        }
        f(&mut shard, now)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.with_entry(key, |shard, now| {
            shard.insert(key.to_string(), Entry::new(value.to_string(), ttl_seconds, now));
            Ok(())
        })
    }

    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> StoreResult<bool> {
        self.with_entry(key, |shard, now| {
            if shard.contains_key(key) {
                return Ok(false);
            }
            shard.insert(key.to_string(), Entry::new(value.to_string(), ttl_seconds, now));
            Ok(true)
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entry(key, |shard, _| Ok(shard.get(key).map(|e| e.value.clone())))
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entry(key, |shard, _| Ok(shard.remove(key).map(|e| e.value)))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.with_entry(key, |shard, _| Ok(shard.contains_key(key)))
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        self.with_entry(key, |shard, now| {
            Ok(match shard.get(key) {
                None => KeyTtl::Absent,
                Some(Entry { expires_at: None, .. }) => KeyTtl::NoExpiry,
                Some(Entry {
                    expires_at: Some(at),
                    ..
                }) => KeyTtl::ExpiresIn(ceil_seconds(at.saturating_duration_since(now))),
            })
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_entry(key, |shard, _| {
            shard.remove(key);
            Ok(())
        })
    }

    async fn increment(&self, key: &str) -> StoreResult<i64> {
        self.with_entry(key, |shard, _| {
            let entry = shard.entry(key.to_string()).or_insert_with(|| Entry {
                value: "0".to_string(),
                expires_at: None,
            });
            let next = entry
                .value
                .parse::<i64>()
                .ok()
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| StoreError::Backend {
                    message: "value is not an integer or out of range".to_string(),
                })?;
            entry.value = next.to_string();
            Ok(next)
        })
    }

    async fn extend_expiry(&self, key: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.with_entry(key, |shard, now| {
            if let Some(entry) = shard.get_mut(key) {
                entry.expires_at = expiry_from(now, ttl_seconds);
            }
            Ok(())
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// Expiries beyond what Instant can represent are treated as never expiring
fn expiry_from(now: Instant, ttl_seconds: u64) -> Option<Instant> {
    now.checked_add(Duration::from_secs(ttl_seconds))
}

/// Whole seconds, rounded up so a live key never reports 0
fn ceil_seconds(remaining: Duration) -> u64 {
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}
