//! Telegram Bot API notifier
//!
//! Identities are Telegram chat ids. The code is sent with `sendMessage` in
//! HTML parse mode, wrapped in `<code>` so clients render it copyable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use otp_core::errors::NotifierError;
use otp_core::services::Notifier;
use otp_shared::config::NotifierConfig;
use otp_shared::utils::mask_identity;

use crate::InfrastructureError;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Notifier delivering codes as Telegram bot messages
pub struct TelegramNotifier {
    client: reqwest::Client,
    /// Full `sendMessage` URL; contains the bot token, never logged
    endpoint: String,
    config: NotifierConfig,
}

impl TelegramNotifier {
    /// Build the notifier; fails if no bot token is configured
    pub fn new(config: &NotifierConfig) -> Result<Self, InfrastructureError> {
        let token = config
            .telegram_bot_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| InfrastructureError::Config("Telegram bot token not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()?;

        info!(provider = "telegram", "Telegram notifier initialized");

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.telegram_api_base.trim_end_matches('/'),
                token
            ),
            config: config.clone(),
        })
    }

    fn delivery_error(masked: &str, message: String) -> NotifierError {
        error!(identity = %masked, provider = "telegram", error = %message, "Telegram delivery failed");
        NotifierError::Delivery { message }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifierError> {
        let masked = mask_identity(identity);
        let text = self.config.render_message(&format!("<code>{}</code>", code));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: identity,
                text: &text,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| Self::delivery_error(&masked, e.without_url().to_string()))?;

        let status = response.status();
        let body: BotApiResponse = response.json().await.map_err(|e| {
            Self::delivery_error(
                &masked,
                format!("unreadable Bot API reply (HTTP {}): {}", status.as_u16(), e.without_url()),
            )
        })?;

        if !body.ok {
            return Err(Self::delivery_error(
                &masked,
                body.description
                    .unwrap_or_else(|| format!("Bot API rejected message (HTTP {})", status.as_u16())),
            ));
        }

        info!(
            identity = %masked,
            provider = "telegram",
            event = "otp_delivered",
            "OTP sent via Telegram"
        );
        Ok(())
    }
}
