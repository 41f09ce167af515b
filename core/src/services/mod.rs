//! Services containing the OTP domain logic.

pub mod otp;

// Re-export commonly used types
pub use otp::{
    CodeGenerator, KeySpace, KeyTtl, KeyValueStore, Notifier, OtpEngine, RandomCodeGenerator,
    RequestResult, DEFAULT_PURPOSE,
};
