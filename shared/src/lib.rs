//! Shared utilities and configuration for the passcode service
//!
//! This crate provides functionality used by every other crate in the workspace:
//! - Configuration types and the layered configuration loader
//! - Identity masking for logs
//! - Input validation for identities, purposes and codes
//! - Phone number helpers for callers using phone numbers as identities

pub mod config;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, CacheConfig, CodeLookupLimit, ConfigError, Environment, LogFormat,
    LoggingConfig, NotifierConfig, NotifierProvider, OtpConfig, StoreBackendPolicy,
};
pub use utils::{identity, phone, validation};
