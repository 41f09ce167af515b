//! Store key layout for the OTP engine

/// Builds the namespaced keys for every record family the engine owns
///
/// ```text
/// <prefix>:code:<purpose>:<identity>           -> code
/// <prefix>:code_by_value:<purpose>:<code>      -> identity
/// <prefix>:cooldown:<purpose>:<identity>       -> "1"
/// <prefix>:attempts:<purpose>:<identity>       -> failed attempt count
/// <prefix>:lookups:<purpose>                   -> code-keyed lookups in window
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn code(&self, purpose: &str, identity: &str) -> String {
        format!("{}:code:{}:{}", self.prefix, purpose, identity)
    }

    pub fn code_by_value(&self, purpose: &str, code: &str) -> String {
        format!("{}:code_by_value:{}:{}", self.prefix, purpose, code)
    }

    pub fn cooldown(&self, purpose: &str, identity: &str) -> String {
        format!("{}:cooldown:{}:{}", self.prefix, purpose, identity)
    }

    pub fn attempts(&self, purpose: &str, identity: &str) -> String {
        format!("{}:attempts:{}:{}", self.prefix, purpose, identity)
    }

    pub fn lookups(&self, purpose: &str) -> String {
        format!("{}:lookups:{}", self.prefix, purpose)
    }
}
