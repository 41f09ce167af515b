//! Types for OTP service results

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of issuing a code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestResult {
    /// Whether the code was handed to the notifier
    pub sent: bool,
    /// Lifetime of the issued code in seconds
    pub expires_in_seconds: u64,
    /// Masked identity, safe to echo back to the caller
    pub identity_masked: String,
    /// Purpose the code was issued for
    pub purpose: String,
    /// Earliest time another code can be requested
    pub next_request_at: DateTime<Utc>,
}
