//! OTP service module for phone and bot based login
//!
//! This module provides the complete one-time-password workflow:
//! - Numeric code generation
//! - Code issuance with request cooldown
//! - Identity-keyed verification with attempt tracking and lockout
//! - Code-keyed verification through a reverse index
//! - Store and delivery abstractions the engine runs against

mod engine;
mod generator;
mod keys;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use engine::{OtpEngine, DEFAULT_PURPOSE};
pub use generator::{generate_code, RandomCodeGenerator};
pub use keys::KeySpace;
pub use traits::{CodeGenerator, KeyTtl, KeyValueStore, Notifier};
pub use types::RequestResult;
