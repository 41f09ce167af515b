//! Common utility functions

pub mod identity;
pub mod phone;
pub mod validation;

// Re-export commonly used utilities
pub use identity::mask_identity;
pub use phone::{is_valid_phone, normalize_phone_number};
pub use validation::{is_valid_code, is_valid_identity, is_valid_purpose};
