//! # Passcode Core
//!
//! Core logic of the passcode service: the OTP engine that issues and verifies
//! short numeric codes, the store and delivery abstractions it runs against,
//! and the error types it reports.
//!
//! The engine holds no mutable state of its own. Everything lives in a
//! [`KeyValueStore`] chosen by the caller at construction time.

pub mod errors;
pub mod services;

// Re-export commonly used types for convenience
pub use errors::*;
pub use services::*;
