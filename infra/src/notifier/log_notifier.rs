//! Log-only notifier for development
//!
//! Writes the delivery to the log instead of sending it anywhere. The code
//! itself is only emitted at `debug` level.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use otp_core::errors::NotifierError;
use otp_core::services::Notifier;
use otp_shared::utils::mask_identity;

/// Notifier that logs deliveries and counts them
#[derive(Clone, Default)]
pub struct LogNotifier {
    /// Counter for tracking number of deliveries
    delivery_count: Arc<AtomicU64>,
    /// Whether to simulate failures (for testing)
    simulate_failure: bool,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier that fails every delivery
    pub fn failing() -> Self {
        Self {
            delivery_count: Arc::new(AtomicU64::new(0)),
            simulate_failure: true,
        }
    }

    /// Get the total number of successful deliveries
    pub fn delivery_count(&self) -> u64 {
        self.delivery_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifierError> {
        let masked = mask_identity(identity);

        if self.simulate_failure {
            warn!(identity = %masked, provider = "log", "Simulating delivery failure");
            return Err(NotifierError::Delivery {
                message: "simulated delivery failure".to_string(),
            });
        }

        let count = self.delivery_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            identity = %masked,
            provider = "log",
            delivery = count,
            event = "otp_delivered",
            "OTP delivered (log-only)"
        );
        debug!(identity = %masked, code = code, "Log-only OTP delivery");
        Ok(())
    }
}
