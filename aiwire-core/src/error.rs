//! Error taxonomy shared by every provider driver
//!
//! Raw provider failures are mapped into a closed set of kinds. A known HTTP
//! status code is the primary signal; case-insensitive substring matching on
//! the message text is the fallback for failures that reach us without one.
//! Classification always produces exactly one kind, with [`AiError::Service`]
//! as the catch-all.

use thiserror::Error;

/// Result type for driver and manager operations
pub type AiResult<T> = Result<T, AiError>;

/// Errors surfaced by drivers and the manager
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiError {
    /// Bad input shape: empty prompt/messages/text, missing default
    /// provider, missing API key. Never retried.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unknown provider name requested from the manager. Never retried.
    #[error("driver '{name}' is not registered")]
    DriverNotFound { name: String },

    /// Key rejected by the provider. Never retried.
    #[error("[{provider}] authentication failed: {message}")]
    Auth { provider: String, message: String },

    /// Provider-side throttling. `retry_after_secs` is passed through from
    /// the provider when it supplied one; the backoff schedule does not
    /// depend on it.
    #[error("[{provider}] rate limit exceeded: {message}")]
    RateLimit {
        provider: String,
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Remote 408 or the local timeout race lost. `timeout_ms` carries the
    /// configured window when the failure originated locally.
    #[error("[{provider}] request timed out: {message}")]
    Timeout {
        provider: String,
        message: String,
        timeout_ms: Option<u64>,
    },

    /// Temporary provider outage (502/503).
    #[error("[{provider}] service unavailable: {message}")]
    ServiceUnavailable { provider: String, message: String },

    /// Anything unclassified. Treated as transient by default; the raw
    /// status (when known) is kept so the retry policy can refuse to retry
    /// 400/401/403 responses that slipped past the other rules.
    #[error("[{provider}] service error: {message}")]
    Service {
        provider: String,
        message: String,
        status: Option<u16>,
    },
}

impl AiError {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for transport mapping and callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::DriverNotFound { .. } => "driver_not_found",
            Self::Auth { .. } => "auth_error",
            Self::RateLimit { .. } => "rate_limit",
            Self::Timeout { .. } => "timeout",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Service { .. } => "service_error",
        }
    }

    /// Canonical HTTP-style status for each kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Configuration { .. } => 400,
            Self::DriverNotFound { .. } => 404,
            Self::Auth { .. } => 401,
            Self::RateLimit { .. } => 429,
            Self::Timeout { .. } => 408,
            Self::ServiceUnavailable { .. } => 503,
            Self::Service { .. } => 500,
        }
    }

    /// Provider the failure originated from, when it came from a remote call.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Auth { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::ServiceUnavailable { provider, .. }
            | Self::Service { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Whether the retry policy may attempt this call again.
    ///
    /// Auth failures and validation errors are never transient. A generic
    /// service error with a raw 400/401/403 status is not transient either:
    /// those statuses signal a request the provider will keep rejecting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Configuration { .. } | Self::DriverNotFound { .. } | Self::Auth { .. } => false,
            Self::Service {
                status: Some(400 | 401 | 403),
                ..
            } => false,
            Self::RateLimit { .. }
            | Self::Timeout { .. }
            | Self::ServiceUnavailable { .. }
            | Self::Service { .. } => true,
        }
    }
}

/// Classify a raw failure into one of the taxonomy kinds.
///
/// Pure function of `(message, status)`. A recognized status code decides
/// immediately; otherwise the message is scanned for the known markers.
pub fn classify(provider: &str, message: &str, status: Option<u16>) -> AiError {
    let provider = provider.to_string();
    let message_owned = message.to_string();
    let lower = message.to_lowercase();

    match status {
        Some(401) => {
            return AiError::Auth {
                provider,
                message: message_owned,
            }
        }
        Some(429) => {
            return AiError::RateLimit {
                provider,
                message: message_owned,
                retry_after_secs: None,
            }
        }
        Some(408) => {
            return AiError::Timeout {
                provider,
                message: message_owned,
                timeout_ms: None,
            }
        }
        Some(502 | 503) => {
            return AiError::ServiceUnavailable {
                provider,
                message: message_owned,
            }
        }
        _ => {}
    }

    // A known 400/403 is final regardless of what the message mentions; the
    // substring fallback may refine it to Auth (also never retried) but must
    // not produce a transient kind the retry policy would act on.
    let status_is_final = matches!(status, Some(400 | 403));

    if lower.contains("api key")
        || lower.contains("api_key")
        || lower.contains("authentication")
        || lower.contains("401")
    {
        AiError::Auth {
            provider,
            message: message_owned,
        }
    } else if status_is_final {
        AiError::Service {
            provider,
            message: message_owned,
            status,
        }
    } else if lower.contains("rate limit") || lower.contains("429") {
        AiError::RateLimit {
            provider,
            message: message_owned,
            retry_after_secs: None,
        }
    } else if lower.contains("timeout") || lower.contains("408") {
        AiError::Timeout {
            provider,
            message: message_owned,
            timeout_ms: None,
        }
    } else if lower.contains("502") || lower.contains("503") || lower.contains("service_unavailable")
    {
        AiError::ServiceUnavailable {
            provider,
            message: message_owned,
        }
    } else {
        AiError::Service {
            provider,
            message: message_owned,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Some(401), "whatever" => "auth_error"; "status 401")]
    #[test_case(Some(429), "whatever" => "rate_limit"; "status 429")]
    #[test_case(Some(408), "whatever" => "timeout"; "status 408")]
    #[test_case(Some(502), "whatever" => "service_unavailable"; "status 502")]
    #[test_case(Some(503), "whatever" => "service_unavailable"; "status 503")]
    #[test_case(None, "Invalid API key provided" => "auth_error"; "api key text")]
    #[test_case(None, "API_KEY_INVALID" => "auth_error"; "api key constant")]
    #[test_case(None, "authentication required" => "auth_error"; "authentication text")]
    #[test_case(None, "Rate limit exceeded for gpt-4" => "rate_limit"; "rate limit text")]
    #[test_case(None, "connection timeout" => "timeout"; "timeout text")]
    #[test_case(None, "upstream returned 503" => "service_unavailable"; "503 text")]
    #[test_case(None, "SERVICE_UNAVAILABLE" => "service_unavailable"; "unavailable constant")]
    #[test_case(None, "something odd happened" => "service_error"; "catch all")]
    #[test_case(Some(500), "internal error" => "service_error"; "status 500 falls through")]
    #[test_case(Some(400), "API key not valid" => "auth_error"; "400 refined to auth")]
    #[test_case(Some(400), "rate limit note in body" => "service_error"; "400 stays final")]
    #[test_case(Some(403), "request timeout mentioned" => "service_error"; "403 stays final")]
    fn classification(status: Option<u16>, message: &str) -> &'static str {
        classify("openai", message, status).code()
    }

    #[test]
    fn classified_errors_carry_provider_and_message() {
        let error = classify("gemini", "Rate limit exceeded", None);
        assert_eq!(error.provider(), Some("gemini"));
        assert_eq!(error.status_code(), 429);
        assert!(error.to_string().contains("Rate limit exceeded"));
    }

    #[test]
    fn status_wins_over_message() {
        // Message mentions a rate limit but the status says auth.
        let error = classify("openai", "rate limit", Some(401));
        assert_eq!(error.code(), "auth_error");
    }

    #[test]
    fn transience_rules() {
        assert!(!AiError::configuration("empty prompt").is_transient());
        assert!(!AiError::DriverNotFound {
            name: "nope".into()
        }
        .is_transient());
        assert!(!classify("openai", "bad api key", Some(401)).is_transient());
        assert!(classify("openai", "slow down", Some(429)).is_transient());
        assert!(classify("openai", "oops", Some(503)).is_transient());
        assert!(classify("openai", "unknown", None).is_transient());
        // Raw 4xx statuses that classified as generic are not retryable.
        assert!(!classify("openai", "malformed body", Some(400)).is_transient());
        assert!(!classify("openai", "forbidden", Some(403)).is_transient());
    }
}
