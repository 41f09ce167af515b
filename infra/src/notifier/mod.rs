//! Notifier module
//!
//! Delivery channels for issued codes. The engine calls exactly one notifier
//! per issued code; choosing and configuring it happens here.
//!
//! ## Channels
//!
//! - **Log**: writes the delivery to the log (development)
//! - **HTTP SMS**: JSON POST to an SMS gateway
//! - **Telegram**: Bot API `sendMessage` to the identity's chat
//! - **Spawned**: wraps any channel to deliver on a background task

use std::sync::Arc;
use tracing::info;

use otp_core::services::Notifier;
use otp_shared::config::{NotifierConfig, NotifierProvider};

use crate::InfrastructureError;

pub mod http_sms;
pub mod log_notifier;
pub mod spawned;
pub mod telegram;

pub use http_sms::HttpSmsNotifier;
pub use log_notifier::LogNotifier;
pub use spawned::SpawnedNotifier;
pub use telegram::TelegramNotifier;

#[cfg(test)]
mod tests;

/// Create the notifier described by `config`
///
/// A missing gateway URL or bot token is a configuration error; there is no
/// silent fallback to the log notifier.
pub fn create_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, InfrastructureError> {
    let notifier: Arc<dyn Notifier> = match config.provider {
        NotifierProvider::Log => Arc::new(LogNotifier::new()),
        NotifierProvider::HttpSms => Arc::new(HttpSmsNotifier::new(config)?),
        NotifierProvider::Telegram => Arc::new(TelegramNotifier::new(config)?),
    };

    info!(
        provider = ?config.provider,
        spawn_delivery = config.spawn_delivery,
        "Notifier created"
    );

    if config.spawn_delivery {
        return Ok(Arc::new(SpawnedNotifier::new(notifier)));
    }
    Ok(notifier)
}
