//! OTP engine implementation

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use otp_shared::config::OtpConfig;
use otp_shared::utils::{is_valid_code, is_valid_identity, is_valid_purpose, mask_identity};

use crate::errors::{OtpError, OtpResult, StoreError, ValidationError};

use super::generator::RandomCodeGenerator;
use super::keys::KeySpace;
use super::traits::{CodeGenerator, KeyTtl, KeyValueStore, Notifier};
use super::types::RequestResult;

/// Purpose used by callers that do not distinguish flows
pub const DEFAULT_PURPOSE: &str = "generic";

/// Value stored in cooldown markers
const COOLDOWN_SENTINEL: &str = "1";

/// Fresh codes tried before giving up when every candidate is already live
const MAX_CODE_COLLISION_RETRIES: usize = 8;

/// Issues and verifies one-time codes against a [`KeyValueStore`]
///
/// At most one code is live per (identity, purpose). Codes can be verified
/// either with the identity they were issued to ([`OtpEngine::verify`]) or by
/// value alone ([`OtpEngine::verify_by_code`]), which resolves the identity
/// through a reverse index.
///
/// The engine keeps no state between calls, so one instance can be shared
/// across tasks behind an `Arc`.
pub struct OtpEngine {
    /// Store holding every code, cooldown, attempt and index record
    store: Arc<dyn KeyValueStore>,
    /// Delivery of issued codes
    notifier: Arc<dyn Notifier>,
    /// Source of fresh codes
    generator: Arc<dyn CodeGenerator>,
    /// Key layout under the configured prefix
    keys: KeySpace,
    /// Engine configuration
    config: OtpConfig,
}

impl OtpEngine {
    /// Create an engine using the OS random source for codes
    ///
    /// # Errors
    ///
    /// Returns `OtpError::Configuration` if `config` fails validation.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        config: OtpConfig,
    ) -> OtpResult<Self> {
        Self::with_generator(store, notifier, Arc::new(RandomCodeGenerator), config)
    }

    /// Create an engine with a custom code generator
    pub fn with_generator(
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        generator: Arc<dyn CodeGenerator>,
        config: OtpConfig,
    ) -> OtpResult<Self> {
        config.validate().map_err(|e| OtpError::Configuration {
            message: e.to_string(),
        })?;

        info!(
            backend = store.backend_name(),
            code_length = config.code_length,
            code_ttl_seconds = config.code_ttl_seconds,
            cooldown_seconds = config.request_cooldown_seconds,
            max_attempts = config.max_attempts,
            "OTP engine initialized"
        );

        Ok(Self {
            keys: KeySpace::new(config.key_prefix.clone()),
            store,
            notifier,
            generator,
            config,
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Issue a new code for an identity and hand it to the notifier
    ///
    /// This method:
    /// 1. Rejects the request while the cooldown marker is live
    /// 2. Retires the reverse index of any previous live code
    /// 3. Generates a code that no other identity currently holds
    /// 4. Stores the code, the cooldown marker and resets the attempt budget
    /// 5. Calls the notifier once
    ///
    /// # Errors
    ///
    /// * `RateLimited` - a code was requested within the cooldown window
    /// * `Validation` - malformed identity or purpose
    /// * `StoreUnavailable` - a store command failed; nothing was sent
    /// * `NotifierFailed` - the code is stored but delivery failed
    pub async fn request(&self, identity: &str, purpose: &str) -> OtpResult<RequestResult> {
        let identity = validate_identity(identity)?;
        validate_purpose(purpose)?;
        let masked = mask_identity(identity);

        let cooldown_key = self.keys.cooldown(purpose, identity);
        if self.store.exists(&cooldown_key).await? {
            let retry_after_seconds = self.retry_after(&cooldown_key).await;
            warn!(
                identity = %masked,
                purpose = purpose,
                retry_after_seconds = ?retry_after_seconds,
                event = "otp_rate_limited",
                "OTP requested within cooldown window"
            );
            return Err(OtpError::RateLimited { retry_after_seconds });
        }

        let code_key = self.keys.code(purpose, identity);
        if let Some(previous) = self.store.get(&code_key).await? {
            debug!(
                identity = %masked,
                purpose = purpose,
                event = "otp_superseded",
                "Invalidating previously issued code"
            );
            self.release_reverse_index(purpose, &previous, identity).await?;
        }

        let code = self.reserve_code(purpose, identity).await?;
        let ttl = self.config.code_ttl_seconds;

        if let Err(e) = self.store.set_with_expiry(&code_key, &code, ttl).await {
            error!(
                identity = %masked,
                purpose = purpose,
                error = %e,
                event = "otp_storage_failed",
                "Failed to store OTP code"
            );
            let reverse_key = self.keys.code_by_value(purpose, &code);
            if let Err(cleanup) = self.store.delete(&reverse_key).await {
                warn!(
                    identity = %masked,
                    purpose = purpose,
                    error = %cleanup,
                    event = "otp_reservation_release_failed",
                    "Failed to release reserved code after storage error"
                );
            }
            return Err(e.into());
        }

        self.store
            .set_with_expiry(&cooldown_key, COOLDOWN_SENTINEL, self.config.request_cooldown_seconds)
            .await?;
        self.store.delete(&self.keys.attempts(purpose, identity)).await?;

        info!(
            identity = %masked,
            purpose = purpose,
            ttl = ttl,
            event = "otp_requested",
            "OTP issued"
        );

        if let Err(e) = self.notifier.deliver(identity, &code).await {
            error!(
                identity = %masked,
                purpose = purpose,
                error = %e,
                event = "otp_delivery_failed",
                "OTP stored but delivery failed"
            );
            return Err(e.into());
        }

        Ok(RequestResult {
            sent: true,
            expires_in_seconds: ttl,
            identity_masked: masked,
            purpose: purpose.to_string(),
            next_request_at: next_request_at(self.config.request_cooldown_seconds),
        })
    }

    /// Verify a code issued to `identity`
    ///
    /// Returns `Ok(true)` exactly once per issued code. A wrong code counts as a
    /// failed attempt; the attempt that reaches `max_attempts` invalidates the
    /// live code. Missing, expired, consumed and wrong codes all yield
    /// `Ok(false)`.
    ///
    /// # Errors
    ///
    /// * `Validation` - malformed identity, purpose or code format
    /// * `StoreUnavailable` - a store command failed
    pub async fn verify(&self, identity: &str, code: &str, purpose: &str) -> OtpResult<bool> {
        let identity = validate_identity(identity)?;
        validate_purpose(purpose)?;
        let code = self.validate_code(code)?;
        let masked = mask_identity(identity);

        let code_key = self.keys.code(purpose, identity);
        let attempts_key = self.keys.attempts(purpose, identity);

        let stored = match self.store.get(&code_key).await? {
            Some(stored) => stored,
            None => {
                warn!(
                    identity = %masked,
                    purpose = purpose,
                    event = "otp_verify_failed",
                    reason = "no_code",
                    "OTP verification failed"
                );
                return Ok(false);
            }
        };

        if !codes_match(&stored, code) {
            let attempts = self.store.increment(&attempts_key).await?;
            if attempts == 1 {
                self.align_attempts_ttl(&code_key, &attempts_key).await?;
            }

            let max_attempts = i64::from(self.config.max_attempts);
            warn!(
                identity = %masked,
                purpose = purpose,
                attempts = attempts,
                max_attempts = max_attempts,
                event = "otp_verify_failed",
                reason = "wrong_code",
                "OTP verification failed"
            );

            if attempts >= max_attempts {
                self.store.delete(&code_key).await?;
                self.release_reverse_index(purpose, &stored, identity).await?;
                warn!(
                    identity = %masked,
                    purpose = purpose,
                    event = "otp_locked_out",
                    "Maximum verification attempts reached, code invalidated"
                );
            }
            return Ok(false);
        }

        if !self.consume_code_record(&code_key, code).await? {
            return Ok(false);
        }
        self.release_reverse_index(purpose, code, identity).await?;
        self.store.delete(&attempts_key).await?;

        info!(
            identity = %masked,
            purpose = purpose,
            event = "otp_verified",
            "OTP verified"
        );
        Ok(true)
    }

    /// Verify a code by value alone and return the identity it was issued to
    ///
    /// Every successful lookup consumes the code. There is no per-identity
    /// attempt counting in this mode; the optional per-purpose lookup limit in
    /// [`OtpConfig::code_lookup`] throttles guessing instead.
    ///
    /// # Errors
    ///
    /// * `RateLimited` - the per-purpose lookup limit is exhausted
    /// * `Validation` - malformed purpose or code format
    /// * `StoreUnavailable` - a store command failed
    pub async fn verify_by_code(&self, code: &str, purpose: &str) -> OtpResult<Option<String>> {
        validate_purpose(purpose)?;
        let code = self.validate_code(code)?;

        self.check_lookup_limit(purpose).await?;

        let reverse_key = self.keys.code_by_value(purpose, code);
        let identity = match self.store.take(&reverse_key).await? {
            Some(identity) => identity,
            None => {
                warn!(
                    purpose = purpose,
                    event = "otp_lookup_failed",
                    "No live code matches the supplied value"
                );
                return Ok(None);
            }
        };
        let masked = mask_identity(&identity);

        let code_key = self.keys.code(purpose, &identity);
        let current = self.store.get(&code_key).await?;
        if !matches!(current.as_deref(), Some(stored) if codes_match(stored, code))
            || !self.consume_code_record(&code_key, code).await?
        {
            warn!(
                identity = %masked,
                purpose = purpose,
                event = "otp_lookup_failed",
                reason = "stale_index",
                "Reverse index did not match a live code"
            );
            return Ok(None);
        }
        self.store.delete(&self.keys.attempts(purpose, &identity)).await?;

        info!(
            identity = %masked,
            purpose = purpose,
            event = "otp_resolved_by_code",
            "OTP verified by code"
        );
        Ok(Some(identity))
    }

    /// Failed attempts left before the live code is invalidated
    pub async fn remaining_attempts(&self, identity: &str, purpose: &str) -> OtpResult<u32> {
        let identity = validate_identity(identity)?;
        validate_purpose(purpose)?;

        let used = match self.store.get(&self.keys.attempts(purpose, identity)).await? {
            Some(raw) => raw.parse::<u32>().map_err(|_| StoreError::Backend {
                message: "attempt counter is not an integer".to_string(),
            })?,
            None => 0,
        };
        Ok(self.config.max_attempts.saturating_sub(used))
    }

    /// Seconds until another code can be requested, if a cooldown is active
    pub async fn cooldown_remaining(&self, identity: &str, purpose: &str) -> OtpResult<Option<u64>> {
        let identity = validate_identity(identity)?;
        validate_purpose(purpose)?;

        match self.store.remaining_ttl(&self.keys.cooldown(purpose, identity)).await? {
            KeyTtl::ExpiresIn(seconds) => Ok(Some(seconds.max(1))),
            KeyTtl::NoExpiry | KeyTtl::Absent => Ok(None),
        }
    }

    /// Generate a code and claim its reverse index for `identity`
    async fn reserve_code(&self, purpose: &str, identity: &str) -> OtpResult<String> {
        for _ in 0..MAX_CODE_COLLISION_RETRIES {
            let code = self.generator.generate(self.config.code_length);
            let reverse_key = self.keys.code_by_value(purpose, &code);

            if self
                .store
                .set_if_absent_with_expiry(&reverse_key, identity, self.config.code_ttl_seconds)
                .await?
            {
                return Ok(code);
            }
            debug!(
                purpose = purpose,
                event = "otp_code_collision",
                "Generated code is live for another identity, regenerating"
            );
        }

        error!(
            purpose = purpose,
            event = "otp_code_space_exhausted",
            "Could not find a free code"
        );
        Err(OtpError::CodeSpaceExhausted {
            purpose: purpose.to_string(),
        })
    }

    /// Delete the reverse index of `code` if it still points at `identity`
    async fn release_reverse_index(&self, purpose: &str, code: &str, identity: &str) -> OtpResult<()> {
        let reverse_key = self.keys.code_by_value(purpose, code);
        if self.store.get(&reverse_key).await?.as_deref() == Some(identity) {
            self.store.delete(&reverse_key).await?;
        }
        Ok(())
    }

    /// Atomically remove the code record if it holds `code`
    ///
    /// A record replaced by a newer code between the caller's read and this
    /// call is written back with the lifetime it had left, never a longer one.
    pub(super) async fn consume_code_record(&self, code_key: &str, code: &str) -> OtpResult<bool> {
        let remaining = self.store.remaining_ttl(code_key).await?;
        match self.store.take(code_key).await? {
            Some(taken) if codes_match(&taken, code) => Ok(true),
            Some(newer) => {
                match remaining {
                    KeyTtl::ExpiresIn(seconds) if seconds > 0 => {
                        self.store.set_with_expiry(code_key, &newer, seconds).await?;
                    }
                    _ => warn!(
                        event = "otp_code_dropped",
                        "Replaced code had no readable lifetime and was not restored"
                    ),
                }
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Give the attempt counter the remaining lifetime of the code it guards
    async fn align_attempts_ttl(&self, code_key: &str, attempts_key: &str) -> OtpResult<()> {
        let ttl = match self.store.remaining_ttl(code_key).await? {
            KeyTtl::ExpiresIn(seconds) if seconds > 0 => seconds,
            _ => self.config.code_ttl_seconds,
        };
        self.store.extend_expiry(attempts_key, ttl).await?;
        Ok(())
    }

    /// Count a code-keyed lookup against the per-purpose window
    async fn check_lookup_limit(&self, purpose: &str) -> OtpResult<()> {
        let Some(limit) = self.config.code_lookup else {
            return Ok(());
        };

        let key = self.keys.lookups(purpose);
        let count = self.store.increment(&key).await?;
        if count == 1 {
            self.store.extend_expiry(&key, limit.window_seconds).await?;
        }

        if count > i64::from(limit.max_lookups) {
            let retry_after_seconds = match self.store.remaining_ttl(&key).await? {
                KeyTtl::ExpiresIn(seconds) => Some(seconds.max(1)),
                KeyTtl::NoExpiry => {
                    // Window expiry was lost; start a new one.
                    self.store.extend_expiry(&key, limit.window_seconds).await?;
                    Some(limit.window_seconds)
                }
                KeyTtl::Absent => None,
            };
            warn!(
                purpose = purpose,
                lookups = count,
                max_lookups = limit.max_lookups,
                event = "otp_lookup_rate_limited",
                "Code lookup limit exceeded"
            );
            return Err(OtpError::RateLimited { retry_after_seconds });
        }
        Ok(())
    }

    /// Remaining cooldown for the rate-limit countdown; `None` if unreadable
    async fn retry_after(&self, cooldown_key: &str) -> Option<u64> {
        match self.store.remaining_ttl(cooldown_key).await {
            Ok(KeyTtl::ExpiresIn(seconds)) => Some(seconds.max(1)),
            Ok(KeyTtl::NoExpiry) | Ok(KeyTtl::Absent) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read cooldown TTL");
                None
            }
        }
    }

    fn validate_code<'a>(&self, code: &'a str) -> OtpResult<&'a str> {
        let code = code.trim();
        if !is_valid_code(code, self.config.code_length as usize) {
            return Err(ValidationError::InvalidCodeFormat {
                expected_length: self.config.code_length,
            }
            .into());
        }
        Ok(code)
    }
}

fn validate_identity(identity: &str) -> OtpResult<&str> {
    let identity = identity.trim();
    if !is_valid_identity(identity) {
        return Err(ValidationError::InvalidIdentity.into());
    }
    Ok(identity)
}

fn validate_purpose(purpose: &str) -> OtpResult<()> {
    if !is_valid_purpose(purpose) {
        return Err(ValidationError::InvalidPurpose {
            purpose: purpose.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Constant-time comparison of two codes
fn codes_match(stored: &str, provided: &str) -> bool {
    stored.len() == provided.len() && constant_time_eq(stored.as_bytes(), provided.as_bytes())
}

fn next_request_at(cooldown_seconds: u64) -> DateTime<Utc> {
    let now = Utc::now();
    i64::try_from(cooldown_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|cooldown| now.checked_add_signed(cooldown))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
