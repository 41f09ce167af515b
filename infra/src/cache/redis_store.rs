//! Redis-backed key-value store
//!
//! Shares codes, cooldowns and counters across every process pointed at the
//! same Redis instance. Commands run over a `ConnectionManager`, which
//! replaces the multiplexed connection after it drops. Idempotent commands
//! are retried on transient errors with exponential backoff; `INCR`,
//! `GETDEL` and `SET NX` run once, since a lost reply may hide a write.
//!
//! `take` uses `GETDEL`, which needs Redis 6.2 or newer.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, ErrorKind, RedisError, RedisResult};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use otp_core::errors::{StoreError, StoreResult};
use otp_core::services::{KeyTtl, KeyValueStore};
use otp_shared::config::CacheConfig;

use crate::InfrastructureError;

/// Upper bound for the retry backoff in milliseconds
const MAX_RETRY_DELAY_MS: u64 = 5000;

type RedisFuture<T> = Pin<Box<dyn Future<Output = RedisResult<T>> + Send>>;

/// Whether a command may be replayed after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    /// Replaying leaves the same state behind (GET, SETEX, DEL, ...)
    Safe,
    /// The first attempt may have been applied with its reply lost
    Never,
}

impl Replay {
    pub(crate) fn attempt_limit(self, max_retries: u32) -> u32 {
        match self {
            Replay::Safe => max_retries,
            Replay::Never => 1,
        }
    }
}

/// Redis store with connection retry and per-command retry logic
#[derive(Clone)]
pub struct RedisStore {
    /// Self-healing connection for async operations
    connection: ConnectionManager,
    /// Maximum number of attempts for a command
    max_retries: u32,
    /// Base delay between retries (exponential backoff)
    retry_delay_ms: u64,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with `PING`
    ///
    /// Each connection attempt is bounded by `connection_timeout_seconds`;
    /// failed attempts are retried up to `max_retries` times.
    pub async fn connect(config: &CacheConfig) -> Result<Self, InfrastructureError> {
        info!(url = %mask_url(&config.url), "Connecting to Redis store");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            error!(error = %e, "Failed to parse Redis URL");
            InfrastructureError::Config(format!("Invalid Redis URL: {}", e))
        })?;

        let max_retries = config.max_retries.max(1);
        let connection = Self::create_connection_with_retry(
            &client,
            Duration::from_secs(config.connection_timeout_seconds.max(1)),
            max_retries,
            config.retry_delay_ms,
        )
        .await?;

        let store = Self {
            connection,
            max_retries,
            retry_delay_ms: config.retry_delay_ms,
        };
        store.ping().await?;

        info!("Redis store ready");
        Ok(store)
    }

    async fn create_connection_with_retry(
        client: &Client,
        connect_timeout: Duration,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Result<ConnectionManager, InfrastructureError> {
        let mut attempts = 0;
        let mut delay = retry_delay_ms;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Attempting to connect to Redis");

            // Reconnects get a single attempt each; the next command retries them.
            let manager =
                ConnectionManager::new_with_backoff(client.clone(), 2, retry_delay_ms.max(1), 0);
            let result = match timeout(connect_timeout, manager).await {
                Ok(result) => result,
                Err(_) => Err(RedisError::from((ErrorKind::IoError, "connection timed out"))),
            };

            match result {
                Ok(connection) => return Ok(connection),
                Err(e) if attempts < max_retries => {
                    warn!(
                        attempt = attempts,
                        max_retries = max_retries,
                        retry_in_ms = delay,
                        error = %e,
                        "Failed to connect to Redis, retrying"
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY_MS);
                }
                Err(e) => {
                    error!(attempts = attempts, error = %e, "Failed to connect to Redis");
                    return Err(InfrastructureError::Cache(e));
                }
            }
        }
    }

    /// Run a command, retrying transient failures with exponential backoff
    /// when `replay` allows it
    async fn execute_with_retry<F, T>(
        &self,
        command: &'static str,
        replay: Replay,
        operation: F,
    ) -> StoreResult<T>
    where
        F: Fn(ConnectionManager) -> RedisFuture<T>,
    {
        let max_attempts = replay.attempt_limit(self.max_retries);
        let mut attempts = 0;
        let mut delay = self.retry_delay_ms;

        loop {
            attempts += 1;

            match operation(self.connection.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) if attempts < max_attempts && is_retriable_error(&e) => {
                    warn!(
                        command = command,
                        attempt = attempts,
                        max_retries = max_attempts,
                        retry_in_ms = delay,
                        error = %e,
                        "Redis command failed, retrying"
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY_MS);
                }
                Err(e) => {
                    error!(command = command, attempts = attempts, error = %e, "Redis command failed");
                    return Err(to_store_error(e));
                }
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.execute_with_retry("SETEX", Replay::Safe, |mut conn| {
            let key = key.to_string();
            let value = value.to_string();
            Box::pin(async move { conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await })
        })
        .await
    }

    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> StoreResult<bool> {
        self.execute_with_retry("SET NX", Replay::Never, |mut conn| {
            let key = key.to_string();
            let value = value.to_string();
            Box::pin(async move {
                let reply: Option<String> = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_seconds)
                    .query_async(&mut conn)
                    .await?;
                Ok(reply.is_some())
            })
        })
        .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.execute_with_retry("GET", Replay::Safe, |mut conn| {
            let key = key.to_string();
            Box::pin(async move { conn.get::<_, Option<String>>(key).await })
        })
        .await
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.execute_with_retry("GETDEL", Replay::Never, |mut conn| {
            let key = key.to_string();
            Box::pin(async move {
                redis::cmd("GETDEL")
                    .arg(key)
                    .query_async::<_, Option<String>>(&mut conn)
                    .await
            })
        })
        .await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.execute_with_retry("EXISTS", Replay::Safe, |mut conn| {
            let key = key.to_string();
            Box::pin(async move { conn.exists::<_, bool>(key).await })
        })
        .await
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let ttl = self
            .execute_with_retry("TTL", Replay::Safe, |mut conn| {
                let key = key.to_string();
                Box::pin(async move { conn.ttl::<_, i64>(key).await })
            })
            .await?;
        Ok(ttl_from_reply(ttl))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.execute_with_retry("DEL", Replay::Safe, |mut conn| {
            let key = key.to_string();
            Box::pin(async move { conn.del::<_, u32>(key).await })
        })
        .await
        .map(|_| ())
    }

    async fn increment(&self, key: &str) -> StoreResult<i64> {
        self.execute_with_retry("INCR", Replay::Never, |mut conn| {
            let key = key.to_string();
            Box::pin(async move { conn.incr::<_, _, i64>(key, 1).await })
        })
        .await
    }

    async fn extend_expiry(&self, key: &str, ttl_seconds: u64) -> StoreResult<()> {
        let seconds = i64::try_from(ttl_seconds).map_err(|_| StoreError::Backend {
            message: format!("expiry of {} seconds is out of range", ttl_seconds),
        })?;
        self.execute_with_retry("EXPIRE", Replay::Safe, |mut conn| {
            let key = key.to_string();
            Box::pin(async move { conn.expire::<_, bool>(key, seconds).await })
        })
        .await
        .map(|_| ())
    }

    async fn ping(&self) -> StoreResult<()> {
        let response = self
            .execute_with_retry("PING", Replay::Safe, |mut conn| {
                Box::pin(async move { redis::cmd("PING").query_async::<_, String>(&mut conn).await })
            })
            .await?;

        if response == "PONG" {
            Ok(())
        } else {
            warn!(response = %response, "Redis PING returned unexpected response");
            Err(StoreError::Backend {
                message: format!("unexpected PING response: {}", response),
            })
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Translate a `TTL` reply (-2 missing, -1 no expiry)
pub(crate) fn ttl_from_reply(ttl: i64) -> KeyTtl {
    match ttl {
        -2 => KeyTtl::Absent,
        t if t < 0 => KeyTtl::NoExpiry,
        t => KeyTtl::ExpiresIn(t as u64),
    }
}

/// Check if a Redis error is transient and the command should be retried
pub(crate) fn is_retriable_error(error: &RedisError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::IoError | ErrorKind::ClientError | ErrorKind::BusyLoadingError | ErrorKind::TryAgain
    )
}

fn to_store_error(error: RedisError) -> StoreError {
    if is_retriable_error(&error) {
        StoreError::Unavailable {
            message: error.to_string(),
        }
    } else {
        StoreError::Backend {
            message: error.to_string(),
        }
    }
}

/// Mask credentials in a Redis URL for logging
pub(crate) fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(proto_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > proto_end {
            return format!("{}****{}", &url[..proto_end + 3], &url[at_pos..]);
        }
    }
    url.to_string()
}
