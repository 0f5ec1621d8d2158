//! Secret handling for API keys
//!
//! Keys live in [`SecretString`] so that accidental `Debug`/`Display`
//! formatting (log lines, error messages, serialized config dumps) never
//! leaks them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A wrapper type for sensitive strings like API keys
#[derive(Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the actual value (use with caution).
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Partially redacted form for debugging: keeps a recognizable prefix
    /// and suffix on longer keys, fully redacts short ones.
    pub fn partial_redact(&self) -> String {
        let len = self.value.len();
        if len == 0 {
            "[EMPTY]".to_string()
        } else if len <= 8 {
            "[REDACTED]".to_string()
        } else {
            format!("{}...{}", &self.value[..3], &self.value[len - 4..])
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_debug_are_redacted() {
        let secret = SecretString::new("sk-1234567890abcdef");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
    }

    #[test]
    fn expose_returns_the_value() {
        let secret = SecretString::new("my-secret-value");
        assert_eq!(secret.expose_secret(), "my-secret-value");
    }

    #[test]
    fn partial_redact_keeps_prefix_and_suffix() {
        assert_eq!(
            SecretString::new("sk-1234567890abcdef").partial_redact(),
            "sk-...cdef"
        );
        assert_eq!(SecretString::new("short").partial_redact(), "[REDACTED]");
        assert_eq!(SecretString::new("").partial_redact(), "[EMPTY]");
    }
}
