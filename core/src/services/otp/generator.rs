//! Numeric code generation

use rand::{rngs::OsRng, Rng};

use otp_shared::config::otp::MAX_CODE_LENGTH;

use super::traits::CodeGenerator;

/// Generate a code uniformly from all `length`-digit numbers
///
/// The value is drawn from `[10^(length-1), 10^length - 1]`, so the first digit
/// is never zero. Uses `OsRng` (OS-provided CSPRNG). `length` is clamped to
/// `1..=18`.
pub fn generate_code(length: u32) -> String {
    let length = length.clamp(1, MAX_CODE_LENGTH);
    let low = 10u64.pow(length - 1);
    let high = 10u64.pow(length) - 1;
    OsRng.gen_range(low..=high).to_string()
}

/// Default generator backed by the OS random source
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, length: u32) -> String {
        generate_code(length)
    }
}
