//! Identity masking for logs and caller-facing echoes

/// Characters kept visible at the start of a masked identity
const VISIBLE_PREFIX: usize = 2;

/// Characters kept visible at the end of a masked identity
const VISIBLE_SUFFIX: usize = 3;

/// Mask an identity for display (e.g., `+998901234567` -> `+9********567`)
///
/// Identities too short to hide at least one character are masked entirely.
pub fn mask_identity(identity: &str) -> String {
    let chars: Vec<char> = identity.trim().chars().collect();
    let len = chars.len();

    if len <= VISIBLE_PREFIX + VISIBLE_SUFFIX {
        return "*".repeat(len);
    }

    let mut masked = String::with_capacity(len);
    masked.extend(&chars[..VISIBLE_PREFIX]);
    masked.push_str(&"*".repeat(len - VISIBLE_PREFIX - VISIBLE_SUFFIX));
    masked.extend(&chars[len - VISIBLE_SUFFIX..]);
    masked
}
