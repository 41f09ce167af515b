//! Engine construction from application configuration
//!
//! Callers own the returned engine and share it through the `Arc`; nothing is
//! stored in process-wide state.

use std::sync::Arc;
use tracing::info;

use otp_core::services::OtpEngine;
use otp_shared::config::AppConfig;

use crate::cache::{select_store, StorageBackend};
use crate::notifier::create_notifier;
use crate::InfrastructureError;

/// Engine ready to serve requests, with the store backend it was built on
pub struct Bootstrapped {
    pub engine: Arc<OtpEngine>,
    pub backend: StorageBackend,
}

/// Validate `config`, select the store, build the notifier and the engine
pub async fn build_engine(config: &AppConfig) -> Result<Bootstrapped, InfrastructureError> {
    config.validate()?;

    let notifier = create_notifier(&config.notifier)?;
    let selected = select_store(&config.cache).await?;
    let engine = OtpEngine::new(selected.store, notifier, config.otp.clone())?;

    info!(
        environment = %config.environment,
        backend = %selected.backend,
        event = "engine_ready",
        "OTP engine bootstrapped"
    );

    Ok(Bootstrapped {
        engine: Arc::new(engine),
        backend: selected.backend,
    })
}
