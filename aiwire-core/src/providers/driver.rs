//! Driver contract every provider implements
//!
//! A driver wraps one configured provider: it owns its HTTP client for its
//! whole lifetime, holds no other mutable state, and is safe to call
//! concurrently through an `Arc`.

use crate::config::DriverConfig;
use crate::error::{AiError, AiResult};
use crate::protocol::{
    CallOptions, ChatMessage, ChatResponse, EmbedInput, EmbeddingResponse, StreamResponse,
    TextResponse,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Uniform operation set over a remote completion provider
#[async_trait]
pub trait Driver: Send + Sync + std::fmt::Debug {
    /// Single-prompt completion. Fails with a configuration error on an
    /// empty or whitespace-only prompt, before any network call.
    async fn generate(&self, prompt: &str, options: &CallOptions) -> AiResult<TextResponse>;

    /// Multi-turn completion. The response carries the input history with
    /// the assistant reply appended, order preserved.
    async fn chat(&self, messages: &[ChatMessage], options: &CallOptions)
        -> AiResult<ChatResponse>;

    /// Embed one or more texts; output vectors are in input order.
    async fn embed(&self, input: EmbedInput, options: &CallOptions) -> AiResult<EmbeddingResponse>;

    /// Streaming completion. Not retried: a partially consumed stream
    /// cannot be safely replayed. The connection attempt is still bounded
    /// by the configured timeout.
    async fn stream(&self, prompt: &str, options: &CallOptions) -> AiResult<StreamResponse>;

    /// Constant provider identifier ("openai", "gemini", ...).
    fn name(&self) -> &str;

    /// Best-effort liveness probe; returns `false` instead of erroring when
    /// the probe itself fails.
    async fn is_configured(&self) -> bool;

    /// Release the remote client handle. No-op for providers whose
    /// transport needs no explicit teardown.
    fn close(&self) {}
}

/// The closed set of supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// Construct a driver for this provider from resolved settings.
    pub fn create_driver(&self, config: DriverConfig) -> AiResult<Arc<dyn Driver>> {
        match self {
            Self::OpenAi => Ok(Arc::new(super::openai::OpenAiDriver::new(config)?)),
            Self::Gemini => Ok(Arc::new(super::gemini::GeminiDriver::new(config)?)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// Completion model used when the configuration names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough token estimate for providers that omit usage figures: one token
/// per four characters, rounded up. An approximation, not a tokenizer;
/// real counts diverge on non-Latin text and code.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

pub(crate) fn require_prompt(prompt: &str) -> AiResult<()> {
    if prompt.trim().is_empty() {
        return Err(AiError::configuration("prompt must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_messages(messages: &[ChatMessage]) -> AiResult<()> {
    if messages.is_empty() {
        return Err(AiError::configuration("messages must not be empty"));
    }
    for (index, message) in messages.iter().enumerate() {
        if message.content.trim().is_empty() {
            return Err(AiError::configuration(format!(
                "message at index {index} has empty content"
            )));
        }
    }
    Ok(())
}

pub(crate) fn require_embed_texts(texts: &[String]) -> AiResult<()> {
    if texts.is_empty() {
        return Err(AiError::configuration("embedding input must not be empty"));
    }
    for (index, text) in texts.iter().enumerate() {
        if text.trim().is_empty() {
            return Err(AiError::configuration(format!(
                "embedding input at index {index} is empty"
            )));
        }
    }
    Ok(())
}

/// Lowercased provider finish reason, defaulting to "completed" when the
/// provider did not supply one.
pub(crate) fn normalize_finish_reason(reason: Option<String>) -> Option<String> {
    Some(match reason {
        Some(reason) => reason.to_lowercase(),
        None => "completed".to_string(),
    })
}
