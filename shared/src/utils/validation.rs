//! Input validation for identities, purposes and codes
//!
//! Keys are built as `<prefix>:<family>:<purpose>:<identity>`, so purposes are
//! restricted to a separator-free alphabet and identities to printable
//! non-whitespace characters.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum identity length accepted by the engine
pub const MAX_IDENTITY_LENGTH: usize = 128;

static IDENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9+@._\-]{1,128}$").unwrap()
});

static PURPOSE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_\-]{1,32}$").unwrap()
});

/// Check that an (already trimmed) identity is usable as a key segment
pub fn is_valid_identity(identity: &str) -> bool {
    IDENTITY_REGEX.is_match(identity)
}

/// Check that a purpose tag is usable as a key segment
pub fn is_valid_purpose(purpose: &str) -> bool {
    PURPOSE_REGEX.is_match(purpose)
}

/// Check that a code consists of exactly `length` ASCII digits
pub fn is_valid_code(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_accepts_phone_and_telegram_id() {
        assert!(is_valid_identity("+998901234567"));
        assert!(is_valid_identity("123456789"));
        assert!(is_valid_identity("student@example.com"));
    }

    #[test]
    fn test_identity_rejects_separators_and_whitespace() {
        assert!(!is_valid_identity(""));
        assert!(!is_valid_identity("a b"));
        assert!(!is_valid_identity("a:b"));
        assert!(!is_valid_identity(&"x".repeat(MAX_IDENTITY_LENGTH + 1)));
    }

    #[test]
    fn test_purpose() {
        assert!(is_valid_purpose("generic"));
        assert!(is_valid_purpose("password_reset"));
        assert!(!is_valid_purpose("Login"));
        assert!(!is_valid_purpose("a:b"));
        assert!(!is_valid_purpose(""));
    }

    #[test]
    fn test_code() {
        assert!(is_valid_code("12345", 5));
        assert!(!is_valid_code("1234", 5));
        assert!(!is_valid_code("1234a", 5));
        assert!(!is_valid_code("١٢٣٤٥", 5));
    }
}
