//! OTP engine configuration module

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Largest code length whose value range still fits in a `u64`
pub const MAX_CODE_LENGTH: u32 = 18;

/// Settings that drive code issuance and verification.
///
/// There is intentionally no `Default` implementation: every value is supplied
/// by the deployment, either explicitly or through [`super::AppConfig::load`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OtpConfig {
    /// Number of decimal digits in a generated code
    pub code_length: u32,

    /// Lifetime of an issued code in seconds
    pub code_ttl_seconds: u64,

    /// Minimum interval between two requests for the same identity and purpose
    pub request_cooldown_seconds: u64,

    /// Failed verifications after which the live code is invalidated
    pub max_attempts: u32,

    /// Namespace prepended to every store key
    pub key_prefix: String,

    /// Optional throttle on code-keyed verification
    #[serde(default)]
    pub code_lookup: Option<CodeLookupLimit>,
}

/// Fixed-window limit applied per purpose to code-keyed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CodeLookupLimit {
    /// Lookups allowed within one window
    pub max_lookups: u32,

    /// Window length in seconds
    pub window_seconds: u64,
}

impl OtpConfig {
    /// Check the configuration for values the engine cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_length == 0 || self.code_length > MAX_CODE_LENGTH {
            return Err(ConfigError::invalid(
                "otp.code_length",
                format!("must be between 1 and {}", MAX_CODE_LENGTH),
            ));
        }
        if self.code_ttl_seconds == 0 {
            return Err(ConfigError::invalid("otp.code_ttl_seconds", "must be positive"));
        }
        if self.request_cooldown_seconds == 0 {
            return Err(ConfigError::invalid(
                "otp.request_cooldown_seconds",
                "must be positive",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("otp.max_attempts", "must be at least 1"));
        }
        if self.key_prefix.is_empty() || self.key_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "otp.key_prefix",
                "must be non-empty and contain no whitespace",
            ));
        }
        if let Some(limit) = &self.code_lookup {
            if limit.max_lookups == 0 || limit.window_seconds == 0 {
                return Err(ConfigError::invalid(
                    "otp.code_lookup",
                    "max_lookups and window_seconds must be positive",
                ));
            }
        }
        Ok(())
    }
}
