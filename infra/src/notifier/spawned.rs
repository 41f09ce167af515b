//! Fire-and-forget delivery on a background task

use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

use otp_core::errors::NotifierError;
use otp_core::services::Notifier;
use otp_shared::utils::mask_identity;

/// Runs the wrapped notifier on a spawned tokio task
///
/// `deliver` returns as soon as the task is spawned, so delivery failures are
/// only logged and never reach the engine. Must be called from within a tokio
/// runtime.
pub struct SpawnedNotifier<N: Notifier + ?Sized + 'static> {
    inner: Arc<N>,
}

impl<N: Notifier + ?Sized + 'static> SpawnedNotifier<N> {
    pub fn new(inner: Arc<N>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<N: Notifier + ?Sized + 'static> Notifier for SpawnedNotifier<N> {
    async fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifierError> {
        let inner = self.inner.clone();
        let identity = identity.to_string();
        let code = code.to_string();

        tokio::spawn(async move {
            if let Err(e) = inner.deliver(&identity, &code).await {
                error!(
                    identity = %mask_identity(&identity),
                    error = %e,
                    event = "otp_delivery_failed",
                    "Background OTP delivery failed"
                );
            }
        });
        Ok(())
    }
}
