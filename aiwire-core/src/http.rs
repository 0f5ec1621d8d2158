//! Shared HTTP plumbing for provider drivers
//!
//! Client construction, request-ID correlation, response guards, and the
//! status/body to [`AiError`] mapping every driver goes through. Drivers own
//! their client for their whole lifetime; this module only builds and
//! inspects, it holds no state.

use crate::error::{classify, AiError, AiResult};
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Maximum response size before we refuse to buffer (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("aiwire/", env!("CARGO_PKG_VERSION"));

/// Connect timeout applied to every driver client
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a pooled client for one driver.
///
/// Only the connect timeout lives here; per-call deadlines are enforced by
/// the resilience layer's timeout race so streaming reads are not killed by
/// a whole-request timer.
pub(crate) fn build_client() -> AiResult<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .gzip(true)
        .build()
        .map_err(|e| AiError::configuration(format!("failed to build HTTP client: {e}")))
}

/// Fresh request ID for log/error correlation.
pub(crate) fn new_request_id() -> Uuid {
    Uuid::new_v4()
}

/// Map a reqwest transport failure (no HTTP response arrived) to the taxonomy.
pub(crate) fn transport_error(provider: &str, error: reqwest::Error, request_id: Uuid) -> AiError {
    if error.is_timeout() {
        AiError::Timeout {
            provider: provider.to_string(),
            message: format!("transport timed out [request_id: {request_id}]"),
            timeout_ms: None,
        }
    } else if error.is_connect() {
        AiError::Service {
            provider: provider.to_string(),
            message: format!("connection failed: {error} [request_id: {request_id}]"),
            status: None,
        }
    } else {
        classify(
            provider,
            &format!("{error} [request_id: {request_id}]"),
            error.status().map(|s| s.as_u16()),
        )
    }
}

/// Turn a non-success response into a classified error.
///
/// Pulls the human-readable message out of the provider's error envelope
/// when one is present, and passes a `Retry-After` hint through on rate
/// limits.
pub(crate) async fn error_from_response(
    provider: &str,
    response: Response,
    request_id: Uuid,
) -> AiError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    let body = response.text().await.ok().filter(|body| !body.is_empty());
    let detail = body
        .as_deref()
        .and_then(extract_error_message)
        .or(body)
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    warn!(
        provider,
        status = status.as_u16(),
        %request_id,
        "request failed: {detail}"
    );

    let mut error = classify(
        provider,
        &format!("{detail} [request_id: {request_id}]"),
        Some(status.as_u16()),
    );
    if let AiError::RateLimit {
        retry_after_secs, ..
    } = &mut error
    {
        *retry_after_secs = retry_after;
    }
    error
}

/// Read and deserialize a success response, guarding content type and size.
pub(crate) async fn read_json_body<T: DeserializeOwned>(
    provider: &str,
    response: Response,
    request_id: Uuid,
) -> AiResult<T> {
    validate_content_type(provider, &response, request_id)?;

    if let Some(length) = response.content_length() {
        if length as usize > MAX_RESPONSE_SIZE {
            return Err(oversized(provider, length as usize, request_id));
        }
    }

    let text = response.text().await.map_err(|e| AiError::Service {
        provider: provider.to_string(),
        message: format!("failed to read response body: {e} [request_id: {request_id}]"),
        status: None,
    })?;

    if text.len() > MAX_RESPONSE_SIZE {
        return Err(oversized(provider, text.len(), request_id));
    }

    serde_json::from_str(&text).map_err(|e| {
        warn!(provider, %request_id, "failed to parse response: {e}");
        AiError::Service {
            provider: provider.to_string(),
            message: format!("invalid response format: {e} [request_id: {request_id}]"),
            status: None,
        }
    })
}

fn validate_content_type(provider: &str, response: &Response, request_id: Uuid) -> AiResult<()> {
    if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or("").to_lowercase();
        if !content_type.contains("application/json") {
            return Err(AiError::Service {
                provider: provider.to_string(),
                message: format!(
                    "expected application/json, got {content_type} [request_id: {request_id}]"
                ),
                status: None,
            });
        }
    }
    Ok(())
}

fn oversized(provider: &str, size: usize, request_id: Uuid) -> AiError {
    AiError::Service {
        provider: provider.to_string(),
        message: format!(
            "response size {size} exceeds maximum {MAX_RESPONSE_SIZE} [request_id: {request_id}]"
        ),
        status: None,
    }
}

/// Extract the message from a provider error envelope.
///
/// Both supported providers wrap failures the same way:
/// OpenAI `{"error": {"message": "...", "type": "..."}}`,
/// Gemini `{"error": {"code": 400, "message": "...", "status": "..."}}`.
fn extract_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;

    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            // Gemini's status constant ("RESOURCE_EXHAUSTED", "UNAVAILABLE")
            // is kept alongside the message for the substring fallback.
            if let Some(status) = error.get("status").and_then(Value::as_str) {
                return Some(format!("{message} ({status})"));
            }
            return Some(message.to_string());
        }
        if let Some(message) = error.as_str() {
            return Some(message.to_string());
        }
    }

    json.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Log an outbound call at debug level with its correlation ID.
pub(crate) fn log_request(provider: &str, url: &str, request_id: Uuid) {
    debug!(provider, url, %request_id, "dispatching provider request");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_openai_error_envelope() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            extract_error_message(body).unwrap(),
            "Incorrect API key provided"
        );
    }

    #[test]
    fn extracts_gemini_error_envelope_with_status() {
        let body =
            r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            extract_error_message(body).unwrap(),
            "Quota exceeded (RESOURCE_EXHAUSTED)"
        );
    }

    #[test]
    fn falls_back_to_flat_message_field() {
        assert_eq!(
            extract_error_message(r#"{"message": "nope"}"#).unwrap(),
            "nope"
        );
        assert!(extract_error_message("not json").is_none());
    }
}
