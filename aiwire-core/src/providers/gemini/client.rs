//! Gemini driver implementation
//!
//! Gemini diverges from the chat-completions shape in three ways the driver
//! absorbs: system messages travel out-of-band as `systemInstruction`, the
//! assistant role is called "model", and embeddings are one text per call.

use super::streaming::parse_stream;
use super::types::{
    GeminiContent, GeminiEmbedRequest, GeminiEmbedResponse, GeminiGenerationConfig, GeminiRequest,
    GeminiResponse,
};
use crate::config::DriverConfig;
use crate::error::{AiError, AiResult};
use crate::http;
use crate::protocol::{
    CallOptions, ChatMessage, ChatResponse, EmbedInput, EmbeddingResponse, Role, StreamResponse,
    TextResponse, Usage,
};
use crate::providers::driver::{
    estimate_tokens, normalize_finish_reason, require_embed_texts, require_messages,
    require_prompt, Driver,
};
use crate::resilience::{self, RetryPolicy};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use uuid::Uuid;

const NAME: &str = "gemini";

const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Driver for the Google generative-language API
#[derive(Debug)]
pub struct GeminiDriver {
    config: DriverConfig,
    client: Client,
    policy: RetryPolicy,
}

impl GeminiDriver {
    pub fn new(config: DriverConfig) -> AiResult<Self> {
        let client = http::build_client()?;
        let policy = RetryPolicy::new(config.max_retries);
        Ok(Self {
            config,
            client,
            policy,
        })
    }

    fn model<'a>(&'a self, options: &'a CallOptions) -> &'a str {
        options.model.as_deref().unwrap_or(&self.config.model)
    }

    fn generation_config(options: &CallOptions) -> Option<GeminiGenerationConfig> {
        if options.temperature.is_none() && options.max_tokens.is_none() && options.top_p.is_none()
        {
            return None;
        }
        Some(GeminiGenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
            top_p: options.top_p,
        })
    }

    /// Split the canonical history into Gemini contents plus the
    /// out-of-band system instruction.
    fn convert_messages(messages: &[ChatMessage]) -> GeminiRequest {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {
                    system_parts.push(message.content.clone());
                }
                Role::User => contents.push(GeminiContent::text(Some("user"), &message.content)),
                Role::Assistant => {
                    contents.push(GeminiContent::text(Some("model"), &message.content))
                }
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(GeminiContent::text(None, system_parts.join("\n")))
        };

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: None,
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GeminiRequest,
        request_id: Uuid,
    ) -> AiResult<GeminiResponse> {
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);
        http::log_request(NAME, &url, request_id);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .header("X-Request-ID", request_id.to_string())
            .json(body)
            .send()
            .await
            .map_err(|e| http::transport_error(NAME, e, request_id))?;

        if !response.status().is_success() {
            return Err(http::error_from_response(NAME, response, request_id).await);
        }

        http::read_json_body(NAME, response, request_id).await
    }

    fn completion_text(&self, response: GeminiResponse) -> AiResult<(String, Usage, Option<String>)> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Service {
                provider: NAME.to_string(),
                message: "response contained no candidates".to_string(),
                status: None,
            })?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let usage = match response.usage_metadata {
            Some(metadata) => Usage {
                tokens: metadata
                    .total_token_count
                    .unwrap_or_else(|| estimate_tokens(&text)),
                input_tokens: metadata.prompt_token_count,
                output_tokens: metadata.candidates_token_count,
            },
            None => Usage::total(estimate_tokens(&text)),
        };

        let finish_reason = normalize_finish_reason(candidate.finish_reason);
        Ok((text, usage, finish_reason))
    }

    async fn post_embed_content(
        &self,
        url: &str,
        body: &GeminiEmbedRequest,
        request_id: Uuid,
    ) -> AiResult<GeminiEmbedResponse> {
        http::log_request(NAME, url, request_id);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .header("X-Request-ID", request_id.to_string())
            .json(body)
            .send()
            .await
            .map_err(|e| http::transport_error(NAME, e, request_id))?;

        if !response.status().is_success() {
            return Err(http::error_from_response(NAME, response, request_id).await);
        }

        http::read_json_body(NAME, response, request_id).await
    }

    async fn embed_single(&self, model: &str, text: &str) -> AiResult<Vec<f32>> {
        let body = GeminiEmbedRequest {
            model: format!("models/{model}"),
            content: GeminiContent::text(None, text),
        };
        let url = format!("{}/models/{}:embedContent", self.config.base_url, model);
        let request_id = http::new_request_id();

        let response = resilience::execute(&self.policy, self.config.timeout, NAME, || {
            self.post_embed_content(&url, &body, request_id)
        })
        .await?;

        Ok(response.embedding.values)
    }
}

#[async_trait]
impl Driver for GeminiDriver {
    async fn generate(&self, prompt: &str, options: &CallOptions) -> AiResult<TextResponse> {
        require_prompt(prompt)?;

        let model = self.model(options).to_string();
        let body = GeminiRequest {
            contents: vec![GeminiContent::text(Some("user"), prompt)],
            system_instruction: None,
            generation_config: Self::generation_config(options),
        };
        let request_id = http::new_request_id();

        let response = resilience::execute(&self.policy, self.config.timeout, NAME, || {
            self.generate_content(&model, &body, request_id)
        })
        .await?;

        let (text, usage, finish_reason) = self.completion_text(response)?;
        Ok(TextResponse {
            text,
            usage,
            finish_reason,
            model: Some(model),
        })
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
    ) -> AiResult<ChatResponse> {
        require_messages(messages)?;

        let model = self.model(options).to_string();
        let mut body = Self::convert_messages(messages);
        body.generation_config = Self::generation_config(options);
        let request_id = http::new_request_id();

        let response = resilience::execute(&self.policy, self.config.timeout, NAME, || {
            self.generate_content(&model, &body, request_id)
        })
        .await?;

        let (text, usage, finish_reason) = self.completion_text(response)?;
        let mut history = messages.to_vec();
        history.push(ChatMessage::assistant(text.clone()));
        Ok(ChatResponse {
            text,
            usage,
            finish_reason,
            model: Some(model),
            messages: history,
        })
    }

    async fn embed(&self, input: EmbedInput, options: &CallOptions) -> AiResult<EmbeddingResponse> {
        let texts = input.into_texts();
        require_embed_texts(&texts)?;

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

        // The embedContent endpoint takes one text per call, so the batch is
        // dispatched concurrently; try_join_all keeps results in input
        // order regardless of completion order.
        let embeddings = try_join_all(
            texts
                .iter()
                .map(|text| self.embed_single(&model, text)),
        )
        .await?;

        // Gemini returns no usage figures for embeddings.
        let estimated = texts.iter().map(|text| estimate_tokens(text)).sum();

        Ok(EmbeddingResponse {
            embeddings,
            usage: Usage::total(estimated),
        })
    }

    async fn stream(&self, prompt: &str, options: &CallOptions) -> AiResult<StreamResponse> {
        require_prompt(prompt)?;

        let model = self.model(options).to_string();
        let body = GeminiRequest {
            contents: vec![GeminiContent::text(Some("user"), prompt)],
            system_instruction: None,
            generation_config: Self::generation_config(options),
        };
        let request_id = http::new_request_id();
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, model
        );
        http::log_request(NAME, &url, request_id);

        // No retry wrapper; only the connection attempt is bounded.
        let response = resilience::with_timeout(NAME, self.config.timeout, async {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", self.config.api_key.expose_secret())
                .header("X-Request-ID", request_id.to_string())
                .json(&body)
                .send()
                .await
                .map_err(|e| http::transport_error(NAME, e, request_id))?;

            if !response.status().is_success() {
                return Err(http::error_from_response(NAME, response, request_id).await);
            }
            Ok(response)
        })
        .await?;

        Ok(StreamResponse {
            text: String::new(),
            stream: parse_stream(NAME, response.bytes_stream()),
            usage: Usage::default(),
        })
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn is_configured(&self) -> bool {
        let url = format!("{}/models", self.config.base_url);
        let probe = self
            .client
            .get(&url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .send();

        match tokio::time::timeout(self.config.timeout, probe).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_system_instruction() {
        let request = GeminiDriver::convert_messages(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("bye"),
        ]);

        let instruction = request.system_instruction.unwrap();
        assert_eq!(instruction.parts[0].text, "be brief");
        assert!(instruction.role.is_none());

        let roles: Vec<_> = request
            .contents
            .iter()
            .map(|content| content.role.as_deref().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn multiple_system_messages_are_joined() {
        let request = GeminiDriver::convert_messages(&[
            ChatMessage::system("one"),
            ChatMessage::system("two"),
            ChatMessage::user("hi"),
        ]);
        assert_eq!(
            request.system_instruction.unwrap().parts[0].text,
            "one\ntwo"
        );
    }
}
