//! Error types reported by the OTP engine and its collaborators.

use thiserror::Error;

/// Errors surfaced by [`crate::OtpEngine`] operations
///
/// A wrong, expired or already consumed code is not an error: verification
/// reports it as `false` / `None` so callers cannot tell those cases apart.
#[derive(Error, Debug)]
pub enum OtpError {
    #[error("Too many requests. Try again in {} seconds.", display_retry_after(.retry_after_seconds))]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Code delivery failed: {message}")]
    NotifierFailed { message: String },

    #[error("No free code available for purpose '{purpose}'")]
    CodeSpaceExhausted { purpose: String },

    #[error("Invalid engine configuration: {message}")]
    Configuration { message: String },
}

fn display_retry_after(retry_after_seconds: &Option<u64>) -> String {
    match retry_after_seconds {
        Some(seconds) => seconds.to_string(),
        None => "a few".to_string(),
    }
}

/// Malformed caller input, rejected before the store is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid identity")]
    InvalidIdentity,

    #[error("Invalid purpose: {purpose}")]
    InvalidPurpose { purpose: String },

    #[error("Invalid code format: expected {expected_length} digits")]
    InvalidCodeFormat { expected_length: u32 },
}

/// Errors reported by [`crate::KeyValueStore`] implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unreachable: {message}")]
    Unavailable { message: String },

    #[error("store command failed: {message}")]
    Backend { message: String },
}

/// Errors reported by [`crate::Notifier`] implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifierError {
    #[error("delivery failed: {message}")]
    Delivery { message: String },

    #[error("notifier misconfigured: {message}")]
    Configuration { message: String },
}

impl From<StoreError> for OtpError {
    fn from(error: StoreError) -> Self {
        OtpError::StoreUnavailable {
            message: error.to_string(),
        }
    }
}

impl From<NotifierError> for OtpError {
    fn from(error: NotifierError) -> Self {
        OtpError::NotifierFailed {
            message: error.to_string(),
        }
    }
}

pub type OtpResult<T> = Result<T, OtpError>;

pub type StoreResult<T> = Result<T, StoreError>;
