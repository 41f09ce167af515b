//! Demonstrates wiring the engine from configuration and running both
//! verification modes.
//!
//! Uses Redis when reachable. Set `OTP__CACHE__BACKEND=fallback_to_memory` to
//! run without one.

use otp_infra::{build_engine, telemetry::init_tracing};
use otp_shared::config::AppConfig;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    println!("=== OTP Flow Demo ===\n");

    let bootstrapped = build_engine(&config).await?;
    let engine = bootstrapped.engine;
    println!("Store backend: {}", bootstrapped.backend);

    // Phone login: the client sends back identity and code
    let phone = "+998901234567";
    let result = engine.request(phone, "login").await?;
    println!(
        "Code sent to {}, valid for {}s, next request at {}",
        result.identity_masked, result.expires_in_seconds, result.next_request_at
    );

    match engine.request(phone, "login").await {
        Err(e) => println!("Second request refused: {}", e),
        Ok(_) => println!("Second request unexpectedly accepted"),
    }

    let verified = engine.verify(phone, "00000", "login").await.unwrap_or(false);
    println!(
        "Wrong code accepted: {} ({} attempts left)",
        verified,
        engine.remaining_attempts(phone, "login").await?
    );

    // Bot login: the client only knows the code it was shown
    engine.request("123456789", "bot_login").await?;
    let resolved = engine.verify_by_code("00000", "bot_login").await?;
    info!(resolved = resolved.is_some(), "Lookup by unknown code");
    println!("Unknown code resolves to: {:?}", resolved);

    println!("\n=== Demo Complete ===");
    Ok(())
}
