//! Traits for store, delivery and code generation integration

use async_trait::async_trait;

use crate::errors::{NotifierError, StoreResult};

/// Remaining lifetime of a store key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (never written, deleted or expired)
    Absent,
    /// The key exists and never expires
    NoExpiry,
    /// The key expires in the given number of seconds
    ExpiresIn(u64),
}

/// Key-value store with per-key expiry
///
/// Implementations must make `increment`, `set_if_absent_with_expiry` and `take`
/// atomic with respect to concurrent callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write a value, replacing any previous value and expiry
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Write a value only if the key is absent; returns whether it was written
    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> StoreResult<bool>;

    /// Read a value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Read and delete a value in one step
    async fn take(&self, key: &str) -> StoreResult<Option<String>>;

    /// Check whether a key exists
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Get the remaining lifetime of a key
    async fn remaining_ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// Delete a key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Increment an integer counter, creating it at 1 without expiry if absent
    async fn increment(&self, key: &str) -> StoreResult<i64>;

    /// Set the expiry of an existing key; no-op if the key is absent
    async fn extend_expiry(&self, key: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Check connectivity
    async fn ping(&self) -> StoreResult<()>;

    /// Short backend name for diagnostics
    fn backend_name(&self) -> &'static str;
}

/// Delivery of an issued code to its identity
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a code; called once per issued code, never retried by the engine
    async fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifierError>;
}

/// Source of numeric codes
pub trait CodeGenerator: Send + Sync {
    /// Produce a code of exactly `length` decimal digits
    fn generate(&self, length: u32) -> String;
}
