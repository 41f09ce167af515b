//! Code delivery configuration module

use serde::{Deserialize, Serialize};

/// Delivery channel used for issued codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierProvider {
    /// Log-only delivery for development
    Log,
    /// JSON POST to an SMS gateway
    HttpSms,
    /// Telegram Bot API `sendMessage`
    Telegram,
}

/// Notifier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    /// Delivery channel
    pub provider: NotifierProvider,

    /// SMS gateway endpoint (required for `http_sms`)
    #[serde(default)]
    pub sms_provider_url: Option<String>,

    /// Bearer token sent to the SMS gateway
    #[serde(default)]
    pub sms_api_key: Option<String>,

    /// Bot token (required for `telegram`)
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    /// Bot API base URL
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Run delivery on a background task instead of awaiting it
    #[serde(default)]
    pub spawn_delivery: bool,

    /// Message body; `{code}` is replaced by the issued code
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            provider: NotifierProvider::Log,
            sms_provider_url: None,
            sms_api_key: None,
            telegram_bot_token: None,
            telegram_api_base: default_telegram_api_base(),
            request_timeout_seconds: default_request_timeout(),
            spawn_delivery: false,
            message_template: default_message_template(),
        }
    }
}

impl NotifierConfig {
    /// Render the message body for a code
    pub fn render_message(&self, code: &str) -> String {
        self.message_template.replace("{code}", code)
    }
}

fn default_telegram_api_base() -> String {
    String::from("https://api.telegram.org")
}

fn default_request_timeout() -> u64 {
    5
}

fn default_message_template() -> String {
    String::from("Your verification code: {code}")
}
