//! Configuration module with service-specific sub-modules
//!
//! This module organizes configuration into logical areas:
//! - `otp` - Code length, lifetimes, attempt limits and key namespace
//! - `cache` - Redis connection and degraded-mode policy
//! - `notifier` - Code delivery channel
//! - `environment` - Environment detection and logging configuration

pub mod cache;
pub mod environment;
pub mod notifier;
pub mod otp;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export commonly used types
pub use cache::{CacheConfig, StoreBackendPolicy};
pub use environment::{Environment, LogFormat, LoggingConfig};
pub use notifier::{NotifierConfig, NotifierProvider};
pub use otp::{CodeLookupLimit, OtpConfig};

/// Prefix of environment variables read by [`AppConfig::load`]
pub const ENV_PREFIX: &str = "OTP";

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Complete application configuration combining all sub-configurations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// OTP engine settings
    pub otp: OtpConfig,

    /// Store configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Delivery configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration: defaults, then `config/<environment>.toml` if present,
    /// then `OTP__<SECTION>__<KEY>` environment variables.
    ///
    /// The code-keyed lookup limit is on by default; setting
    /// `otp.code_lookup.enabled = false` turns it off.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = Environment::from_env();
        let settings = Self::defaults(environment)?
            .add_source(config::File::with_name(environment.config_file()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_settings(settings)
    }

    fn defaults(
        environment: Environment,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let logging = LoggingConfig::for_environment(environment);

        Ok(config::Config::builder()
            .set_default("environment", environment.to_string())?
            .set_default("otp.code_length", 5_i64)?
            .set_default("otp.code_ttl_seconds", 300_i64)?
            .set_default("otp.request_cooldown_seconds", 60_i64)?
            .set_default("otp.max_attempts", 3_i64)?
            .set_default("otp.key_prefix", "otp")?
            .set_default("otp.code_lookup.enabled", true)?
            .set_default("otp.code_lookup.max_lookups", 30_i64)?
            .set_default("otp.code_lookup.window_seconds", 60_i64)?
            .set_default("logging.level", logging.level)?
            .set_default("logging.format", format!("{:?}", logging.format).to_lowercase())?)
    }

    fn from_settings(settings: config::Config) -> Result<Self, ConfigError> {
        let lookup_enabled = settings.get_bool("otp.code_lookup.enabled")?;

        let mut app_config: AppConfig = settings.try_deserialize()?;
        if !lookup_enabled {
            app_config.otp.code_lookup = None;
        }
        app_config.validate()?;
        Ok(app_config)
    }

    /// Check cross-section constraints in addition to each section's own rules
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.otp.validate()?;

        if self.environment.is_production()
            && self.cache.backend == StoreBackendPolicy::FallbackToMemory
        {
            return Err(ConfigError::invalid(
                "cache.backend",
                "fallback_to_memory is process-local and not allowed in production",
            ));
        }

        match self.notifier.provider {
            NotifierProvider::HttpSms if self.notifier.sms_provider_url.is_none() => {
                Err(ConfigError::invalid(
                    "notifier.sms_provider_url",
                    "required when provider is http_sms",
                ))
            }
            NotifierProvider::Telegram if self.notifier.telegram_bot_token.is_none() => {
                Err(ConfigError::invalid(
                    "notifier.telegram_bot_token",
                    "required when provider is telegram",
                ))
            }
            _ => Ok(()),
        }
    }
}
