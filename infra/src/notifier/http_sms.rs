//! SMS gateway notifier
//!
//! Posts `{"to": <identity>, "message": <text>}` as JSON to a configured
//! endpoint, authenticated with a bearer token when one is set. Any non-2xx
//! reply is a delivery failure. There are no retries.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use otp_core::errors::NotifierError;
use otp_core::services::Notifier;
use otp_shared::config::NotifierConfig;
use otp_shared::utils::mask_identity;

use crate::InfrastructureError;

#[derive(Debug, Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    message: &'a str,
}

/// Notifier sending codes through an HTTP SMS gateway
pub struct HttpSmsNotifier {
    client: reqwest::Client,
    provider_url: String,
    api_key: Option<String>,
    config: NotifierConfig,
}

impl HttpSmsNotifier {
    /// Build the notifier; fails if no gateway URL is configured
    pub fn new(config: &NotifierConfig) -> Result<Self, InfrastructureError> {
        let provider_url = config
            .sms_provider_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| InfrastructureError::Config("SMS provider URL not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()?;

        info!(provider = "http_sms", "SMS gateway notifier initialized");

        Ok(Self {
            client,
            provider_url,
            api_key: config.sms_api_key.clone().filter(|key| !key.is_empty()),
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpSmsNotifier {
    async fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifierError> {
        let masked = mask_identity(identity);
        let message = self.config.render_message(code);

        let mut request = self.client.post(&self.provider_url).json(&SmsPayload {
            to: identity,
            message: &message,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                error!(identity = %masked, provider = "http_sms", error = %e, "SMS delivery failed");
                NotifierError::Delivery {
                    message: e.to_string(),
                }
            })?;

        info!(
            identity = %masked,
            provider = "http_sms",
            status = response.status().as_u16(),
            event = "otp_delivered",
            "OTP sent via SMS gateway"
        );
        Ok(())
    }
}
