//! Tests for the OTP engine

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use otp_shared::config::CodeLookupLimit;

use super::mocks::*;
use crate::errors::{OtpError, ValidationError};
use crate::services::otp::{KeySpace, KeyValueStore, OtpEngine, DEFAULT_PURPOSE};

const USER: &str = "+998901234567";
const OTHER: &str = "987654321";
const LOGIN: &str = "login";

fn keys() -> KeySpace {
    KeySpace::new("test")
}

#[tokio::test]
async fn test_request_stores_code_and_notifies() {
    let h = harness(&["12345"]);

    let result = h.engine.request(USER, LOGIN).await.unwrap();

    assert!(result.sent);
    assert_eq!(result.expires_in_seconds, 300);
    assert_eq!(result.identity_masked, "+9********567");
    assert_eq!(result.purpose, LOGIN);
    assert!(result.next_request_at > Utc::now());

    let keys = keys();
    assert_eq!(h.store.value(&keys.code(LOGIN, USER)).as_deref(), Some("12345"));
    assert_eq!(h.store.ttl(&keys.code(LOGIN, USER)), Some(300));
    assert_eq!(
        h.store.value(&keys.code_by_value(LOGIN, "12345")).as_deref(),
        Some(USER)
    );
    assert_eq!(h.store.ttl(&keys.cooldown(LOGIN, USER)), Some(60));
    assert_eq!(h.notifier.last_code(USER).as_deref(), Some("12345"));
    assert_eq!(h.notifier.delivery_count(), 1);
}

#[tokio::test]
async fn test_request_within_cooldown_is_rate_limited() {
    let h = harness(&["12345", "54321"]);
    h.engine.request(USER, LOGIN).await.unwrap();

    let err = h.engine.request(USER, LOGIN).await.unwrap_err();
    match err {
        OtpError::RateLimited { retry_after_seconds } => assert_eq!(retry_after_seconds, Some(60)),
        other => panic!("Expected RateLimited, got {:?}", other),
    }

    // The live code is untouched and nothing was sent again
    assert_eq!(
        h.store.value(&keys().code(LOGIN, USER)).as_deref(),
        Some("12345")
    );
    assert_eq!(h.notifier.delivery_count(), 1);
}

#[tokio::test]
async fn test_rate_limit_without_readable_ttl() {
    let h = harness(&["12345"]);
    h.engine.request(USER, LOGIN).await.unwrap();
    h.store.fail_ttl_reads.store(true, Ordering::SeqCst);

    let err = h.engine.request(USER, LOGIN).await.unwrap_err();
    assert!(matches!(
        err,
        OtpError::RateLimited {
            retry_after_seconds: None
        }
    ));
    assert_eq!(err.to_string(), "Too many requests. Try again in a few seconds.");
}

#[tokio::test]
async fn test_wrong_then_right_code() {
    let h = harness(&["12345"]);
    h.engine.request(USER, LOGIN).await.unwrap();

    assert!(!h.engine.verify(USER, "11111", LOGIN).await.unwrap());
    assert_eq!(h.engine.remaining_attempts(USER, LOGIN).await.unwrap(), 2);

    assert!(h.engine.verify(USER, "12345", LOGIN).await.unwrap());

    // Success clears the code and the attempt counter
    let keys = keys();
    assert!(h.store.value(&keys.code(LOGIN, USER)).is_none());
    assert!(h.store.value(&keys.attempts(LOGIN, USER)).is_none());
    assert!(h.store.value(&keys.code_by_value(LOGIN, "12345")).is_none());
    assert_eq!(h.engine.remaining_attempts(USER, LOGIN).await.unwrap(), 3);
}

#[tokio::test]
async fn test_code_is_consumed_exactly_once() {
    let h = harness(&["12345"]);
    h.engine.request(USER, LOGIN).await.unwrap();

    assert!(h.engine.verify(USER, "12345", LOGIN).await.unwrap());
    assert!(!h.engine.verify(USER, "12345", LOGIN).await.unwrap());
    assert_eq!(h.engine.verify_by_code("12345", LOGIN).await.unwrap(), None);
}

#[tokio::test]
async fn test_lockout_after_max_attempts() {
    let h = harness(&["12345"]);
    h.engine.request(USER, LOGIN).await.unwrap();

    for _ in 0..3 {
        assert!(!h.engine.verify(USER, "00000", LOGIN).await.unwrap());
    }

    // The correct code no longer works once the budget is spent
    assert!(!h.engine.verify(USER, "12345", LOGIN).await.unwrap());
    assert_eq!(h.engine.verify_by_code("12345", LOGIN).await.unwrap(), None);
    assert_eq!(h.engine.remaining_attempts(USER, LOGIN).await.unwrap(), 0);
}

#[tokio::test]
async fn test_attempt_counter_follows_code_lifetime() {
    let h = harness(&["12345"]);
    h.engine.request(USER, LOGIN).await.unwrap();

    let keys = keys();
    h.store.set_ttl(&keys.code(LOGIN, USER), 120);

    h.engine.verify(USER, "00000", LOGIN).await.unwrap();
    assert_eq!(h.store.ttl(&keys.attempts(LOGIN, USER)), Some(120));

    // Later failures leave the expiry alone
    h.store.set_ttl(&keys.code(LOGIN, USER), 90);
    h.engine.verify(USER, "00000", LOGIN).await.unwrap();
    assert_eq!(h.store.ttl(&keys.attempts(LOGIN, USER)), Some(120));
}

#[tokio::test]
async fn test_new_request_supersedes_previous_code() {
    let h = harness(&["12345", "54321"]);
    let keys = keys();

    h.engine.request(USER, LOGIN).await.unwrap();
    h.engine.verify(USER, "00000", LOGIN).await.unwrap();
    h.store.remove(&keys.cooldown(LOGIN, USER));

    h.engine.request(USER, LOGIN).await.unwrap();

    // Attempt budget was reset by the new request
    assert_eq!(h.engine.remaining_attempts(USER, LOGIN).await.unwrap(), 3);
    assert!(h.store.value(&keys.code_by_value(LOGIN, "12345")).is_none());
    assert_eq!(h.engine.verify_by_code("12345", LOGIN).await.unwrap(), None);
    assert!(!h.engine.verify(USER, "12345", LOGIN).await.unwrap());
    assert!(h.engine.verify(USER, "54321", LOGIN).await.unwrap());
}

#[tokio::test]
async fn test_verify_without_code_is_false() {
    let h = harness(&["12345"]);

    assert!(!h.engine.verify(USER, "12345", LOGIN).await.unwrap());
    // Nothing to guard, so nothing is counted
    assert!(h.store.value(&keys().attempts(LOGIN, USER)).is_none());
}

#[tokio::test]
async fn test_verify_trims_code_and_identity() {
    let h = harness(&["12345"]);
    h.engine.request(USER, LOGIN).await.unwrap();

    assert!(h
        .engine
        .verify(&format!("  {}  ", USER), " 12345\n", LOGIN)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_verify_by_code_resolves_identity_once() {
    let h = harness(&["54321"]);
    h.engine.request(OTHER, LOGIN).await.unwrap();

    assert_eq!(
        h.engine.verify_by_code("54321", LOGIN).await.unwrap().as_deref(),
        Some(OTHER)
    );
    assert_eq!(h.engine.verify_by_code("54321", LOGIN).await.unwrap(), None);
    assert!(!h.engine.verify(OTHER, "54321", LOGIN).await.unwrap());
}

#[tokio::test]
async fn test_verify_by_code_is_purpose_scoped() {
    let h = harness(&["54321"]);
    h.engine.request(OTHER, LOGIN).await.unwrap();

    assert_eq!(h.engine.verify_by_code("54321", "signup").await.unwrap(), None);
    assert_eq!(
        h.engine.verify_by_code("54321", LOGIN).await.unwrap().as_deref(),
        Some(OTHER)
    );
}

#[tokio::test]
async fn test_purposes_are_independent() {
    let h = harness(&["12345", "67890"]);

    h.engine.request(USER, LOGIN).await.unwrap();
    // Cooldown for login does not block signup
    h.engine.request(USER, "signup").await.unwrap();

    assert!(!h.engine.verify(USER, "12345", "signup").await.unwrap());
    assert_eq!(h.engine.remaining_attempts(USER, LOGIN).await.unwrap(), 3);
    assert!(h.engine.verify(USER, "12345", LOGIN).await.unwrap());
    assert!(h.engine.verify(USER, "67890", "signup").await.unwrap());
}

#[tokio::test]
async fn test_live_code_is_never_shared_between_identities() {
    let h = harness(&["11111", "11111", "22222"]);

    h.engine.request(USER, LOGIN).await.unwrap();
    h.engine.request(OTHER, LOGIN).await.unwrap();

    assert_eq!(h.notifier.last_code(OTHER).as_deref(), Some("22222"));
    assert_eq!(
        h.engine.verify_by_code("11111", LOGIN).await.unwrap().as_deref(),
        Some(USER)
    );
    assert_eq!(
        h.engine.verify_by_code("22222", LOGIN).await.unwrap().as_deref(),
        Some(OTHER)
    );
}

#[tokio::test]
async fn test_code_space_exhausted() {
    let h = harness(&["11111"]);
    h.engine.request(USER, LOGIN).await.unwrap();

    let err = h.engine.request(OTHER, LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::CodeSpaceExhausted { ref purpose } if purpose == LOGIN));

    assert!(h.store.value(&keys().code(LOGIN, OTHER)).is_none());
    assert!(h.store.value(&keys().cooldown(LOGIN, OTHER)).is_none());
    assert_eq!(h.notifier.delivery_count(), 1);
}

#[tokio::test]
async fn test_invalid_input_rejected_before_store() {
    let h = harness(&["12345"]);

    let err = h.engine.verify(USER, "123", LOGIN).await.unwrap_err();
    assert!(matches!(
        err,
        OtpError::Validation(ValidationError::InvalidCodeFormat { expected_length: 5 })
    ));

    let err = h.engine.verify(USER, "12a45", LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::Validation(ValidationError::InvalidCodeFormat { .. })));

    let err = h.engine.request("not valid!", LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::Validation(ValidationError::InvalidIdentity)));

    let err = h.engine.request("", LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::Validation(ValidationError::InvalidIdentity)));

    let err = h.engine.request(USER, "Login Flow").await.unwrap_err();
    assert!(matches!(err, OtpError::Validation(ValidationError::InvalidPurpose { .. })));

    let err = h.engine.verify_by_code("1234567", LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::Validation(_)));

    assert_eq!(h.store.operations.load(Ordering::SeqCst), 0);
    assert_eq!(h.notifier.delivery_count(), 0);
}

#[tokio::test]
async fn test_store_failure_propagates_without_delivery() {
    let h = harness(&["12345"]);
    h.store.should_fail.store(true, Ordering::SeqCst);

    let err = h.engine.request(USER, LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::StoreUnavailable { .. }));
    assert_eq!(h.notifier.delivery_count(), 0);

    let err = h.engine.verify(USER, "12345", LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::StoreUnavailable { .. }));

    let err = h.engine.verify_by_code("12345", LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::StoreUnavailable { .. }));
}

#[tokio::test]
async fn test_storage_failure_releases_reserved_code() {
    let h = harness(&["12345"]);
    h.store.fail_plain_sets.store(true, Ordering::SeqCst);

    let err = h.engine.request(USER, LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::StoreUnavailable { .. }));
    assert!(h.store.value(&keys().code_by_value(LOGIN, "12345")).is_none());
    assert_eq!(h.notifier.delivery_count(), 0);
}

#[tokio::test]
async fn test_storage_failure_reported_when_release_also_fails() {
    let h = harness(&["12345"]);
    h.store.fail_plain_sets.store(true, Ordering::SeqCst);
    h.store.fail_deletes.store(true, Ordering::SeqCst);

    match h.engine.request(USER, LOGIN).await.unwrap_err() {
        OtpError::StoreUnavailable { message } => assert!(message.contains("SETEX")),
        other => panic!("Expected StoreUnavailable, got {:?}", other),
    }
    // Left to expire with the code TTL
    assert_eq!(h.store.ttl(&keys().code_by_value(LOGIN, "12345")), Some(300));
}

#[tokio::test]
async fn test_replaced_code_restored_with_remaining_lifetime() {
    let h = harness(&["12345"]);
    let code_key = keys().code(LOGIN, USER);
    h.store.set_with_expiry(&code_key, "22222", 300).await.unwrap();
    h.store.set_ttl(&code_key, 120);

    assert!(!h.engine.consume_code_record(&code_key, "11111").await.unwrap());

    assert_eq!(h.store.value(&code_key).as_deref(), Some("22222"));
    assert_eq!(h.store.ttl(&code_key), Some(120));
}

#[tokio::test]
async fn test_matching_code_record_consumed() {
    let h = harness(&["12345"]);
    let code_key = keys().code(LOGIN, USER);
    h.store.set_with_expiry(&code_key, "12345", 300).await.unwrap();

    assert!(h.engine.consume_code_record(&code_key, "12345").await.unwrap());
    assert!(h.store.value(&code_key).is_none());
}

#[tokio::test]
async fn test_notifier_failure_keeps_code_and_cooldown() {
    let store = Arc::new(MockStore::new());
    let notifier = Arc::new(MockNotifier::new(true));
    let engine = OtpEngine::with_generator(
        store.clone(),
        notifier.clone(),
        Arc::new(ScriptedCodeGenerator::new(&["12345"])),
        test_config(),
    )
    .unwrap();

    let err = engine.request(USER, LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::NotifierFailed { .. }));
    assert_eq!(notifier.delivery_count(), 1);

    let err = engine.request(USER, LOGIN).await.unwrap_err();
    assert!(matches!(err, OtpError::RateLimited { .. }));

    assert!(engine.verify(USER, "12345", LOGIN).await.unwrap());
}

#[tokio::test]
async fn test_cooldown_remaining() {
    let h = harness(&["12345"]);

    assert_eq!(h.engine.cooldown_remaining(USER, LOGIN).await.unwrap(), None);
    h.engine.request(USER, LOGIN).await.unwrap();
    assert_eq!(h.engine.cooldown_remaining(USER, LOGIN).await.unwrap(), Some(60));
}

#[tokio::test]
async fn test_lookup_limit_throttles_code_guessing() {
    let mut config = test_config();
    config.code_lookup = Some(CodeLookupLimit {
        max_lookups: 2,
        window_seconds: 30,
    });
    let h = harness_with_config(&["12345"], config);
    h.engine.request(USER, LOGIN).await.unwrap();

    assert_eq!(h.engine.verify_by_code("00001", LOGIN).await.unwrap(), None);
    assert_eq!(h.engine.verify_by_code("00002", LOGIN).await.unwrap(), None);

    let err = h.engine.verify_by_code("12345", LOGIN).await.unwrap_err();
    assert!(matches!(
        err,
        OtpError::RateLimited {
            retry_after_seconds: Some(30)
        }
    ));

    // Throttled lookups do not consume the code
    assert!(h.engine.verify(USER, "12345", LOGIN).await.unwrap());
}

#[tokio::test]
async fn test_lookup_limit_is_per_purpose() {
    let mut config = test_config();
    config.code_lookup = Some(CodeLookupLimit {
        max_lookups: 1,
        window_seconds: 30,
    });
    let h = harness_with_config(&["12345"], config);

    assert_eq!(h.engine.verify_by_code("00001", LOGIN).await.unwrap(), None);
    assert!(h.engine.verify_by_code("00002", LOGIN).await.is_err());
    assert_eq!(h.engine.verify_by_code("00003", "signup").await.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let mut config = test_config();
    config.code_length = 0;

    let result = OtpEngine::new(
        Arc::new(MockStore::new()),
        Arc::new(MockNotifier::new(false)),
        config,
    );
    assert!(matches!(result, Err(OtpError::Configuration { .. })));
}

#[tokio::test]
async fn test_two_failures_then_success_within_budget() {
    let h = harness(&["12345"]);
    h.engine.request("u1", DEFAULT_PURPOSE).await.unwrap();

    assert!(!h.engine.verify("u1", "00000", DEFAULT_PURPOSE).await.unwrap());
    assert!(!h.engine.verify("u1", "11111", DEFAULT_PURPOSE).await.unwrap());
    assert_eq!(
        h.store.value(&keys().attempts(DEFAULT_PURPOSE, "u1")).as_deref(),
        Some("2")
    );

    assert!(h.engine.verify("u1", "12345", DEFAULT_PURPOSE).await.unwrap());
    assert!(!h.engine.verify("u1", "12345", DEFAULT_PURPOSE).await.unwrap());
}

#[tokio::test]
async fn test_real_code_rejected_after_lockout() {
    let h = harness(&["54321"]);
    h.engine.request("u2", DEFAULT_PURPOSE).await.unwrap();

    for wrong in ["00000", "00001"] {
        assert!(!h.engine.verify("u2", wrong, DEFAULT_PURPOSE).await.unwrap());
    }
    // One attempt short of the limit the code is still live
    assert!(h.store.value(&keys().code(DEFAULT_PURPOSE, "u2")).is_some());

    assert!(!h.engine.verify("u2", "00002", DEFAULT_PURPOSE).await.unwrap());
    assert!(h.store.value(&keys().code(DEFAULT_PURPOSE, "u2")).is_none());
    assert!(h.store.value(&keys().code_by_value(DEFAULT_PURPOSE, "54321")).is_none());

    assert!(!h.engine.verify("u2", "54321", DEFAULT_PURPOSE).await.unwrap());
}
