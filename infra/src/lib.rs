//! # Infrastructure Layer
//!
//! Concrete implementations of the seams defined by `otp_core`:
//!
//! - **Cache**: Redis store with retry logic and an in-memory fallback store
//! - **Notifier**: code delivery over an SMS gateway, the Telegram Bot API or logs
//! - **Telemetry**: `tracing-subscriber` setup driven by [`LoggingConfig`]
//! - **Bootstrap**: wiring configuration, store and notifier into an engine
//!
//! [`LoggingConfig`]: otp_shared::config::LoggingConfig

// Re-export core types for convenience
pub use otp_core::errors::*;

/// Cache module - Redis and in-memory key-value stores
pub mod cache;

/// Notifier module - code delivery channels
pub mod notifier;

/// Telemetry module - tracing subscriber setup
pub mod telemetry;

/// Bootstrap module - engine construction from configuration
pub mod bootstrap;

pub use bootstrap::{build_engine, Bootstrapped};
pub use cache::{select_store, MemoryStore, RedisStore, SelectedStore, StorageBackend};
pub use notifier::{create_notifier, HttpSmsNotifier, LogNotifier, SpawnedNotifier, TelegramNotifier};

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Redis cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// HTTP request error for external services
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store command error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Engine construction error
    #[error("OTP engine error: {0}")]
    Otp(#[from] OtpError),
}

impl From<otp_shared::config::ConfigError> for InfrastructureError {
    fn from(error: otp_shared::config::ConfigError) -> Self {
        InfrastructureError::Config(error.to_string())
    }
}
