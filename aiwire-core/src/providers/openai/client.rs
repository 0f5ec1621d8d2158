//! OpenAI driver implementation

use super::streaming::parse_stream;
use super::types::{
    OpenAiEmbeddingRequest, OpenAiEmbeddingResponse, OpenAiMessage, OpenAiRequest, OpenAiResponse,
    OpenAiStreamOptions,
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
use reqwest::Client;
use uuid::Uuid;

const NAME: &str = "openai";

/// Embedding model used when the caller does not pick one
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Driver for the OpenAI chat-completions and embeddings APIs
#[derive(Debug)]
pub struct OpenAiDriver {
    config: DriverConfig,
    client: Client,
    policy: RetryPolicy,
}

impl OpenAiDriver {
    pub fn new(config: DriverConfig) -> AiResult<Self> {
        let client = http::build_client()?;
        let policy = RetryPolicy::new(config.max_retries);
        Ok(Self {
            config,
            client,
            policy,
        })
    }

    fn role_name(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn request_body(
        &self,
        messages: Vec<OpenAiMessage>,
        options: &CallOptions,
        stream: bool,
    ) -> OpenAiRequest {
        OpenAiRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stream: stream.then_some(true),
            stream_options: stream.then_some(OpenAiStreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn chat_completion(
        &self,
        body: &OpenAiRequest,
        request_id: Uuid,
    ) -> AiResult<OpenAiResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        http::log_request(NAME, &url, request_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
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

    fn completion_text(&self, response: OpenAiResponse) -> AiResult<(String, Usage, Option<String>, String)> {
        let model = response.model;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Service {
                provider: NAME.to_string(),
                message: "response contained no choices".to_string(),
                status: None,
            })?;

        let text = choice.message.content.unwrap_or_default();
        let usage = match response.usage {
            Some(usage) => Usage {
                tokens: usage.total_tokens,
                input_tokens: Some(usage.prompt_tokens),
                output_tokens: Some(usage.completion_tokens),
            },
            None => Usage::total(estimate_tokens(&text)),
        };
        let finish_reason = normalize_finish_reason(choice.finish_reason);
        Ok((text, usage, finish_reason, model))
    }

    async fn post_embeddings(
        &self,
        body: &OpenAiEmbeddingRequest,
        request_id: Uuid,
    ) -> AiResult<OpenAiEmbeddingResponse> {
        let url = format!("{}/embeddings", self.config.base_url);
        http::log_request(NAME, &url, request_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
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
}

#[async_trait]
impl Driver for OpenAiDriver {
    async fn generate(&self, prompt: &str, options: &CallOptions) -> AiResult<TextResponse> {
        require_prompt(prompt)?;

        let body = self.request_body(
            vec![OpenAiMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            options,
            false,
        );
        let request_id = http::new_request_id();

        let response = resilience::execute(&self.policy, self.config.timeout, NAME, || {
            self.chat_completion(&body, request_id)
        })
        .await?;

        let (text, usage, finish_reason, model) = self.completion_text(response)?;
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

        let wire_messages = messages
            .iter()
            .map(|message| OpenAiMessage {
                role: Self::role_name(message.role).to_string(),
                content: Some(message.content.clone()),
            })
            .collect();
        let body = self.request_body(wire_messages, options, false);
        let request_id = http::new_request_id();

        let response = resilience::execute(&self.policy, self.config.timeout, NAME, || {
            self.chat_completion(&body, request_id)
        })
        .await?;

        let (text, usage, finish_reason, model) = self.completion_text(response)?;
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

        // OpenAI accepts the whole batch in a single request; results come
        // back with an index and are re-ordered by it, not by arrival.
        let body = OpenAiEmbeddingRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            input: texts,
        };
        let request_id = http::new_request_id();

        let response = resilience::execute(&self.policy, self.config.timeout, NAME, || {
            self.post_embeddings(&body, request_id)
        })
        .await?;

        let mut data = response.data;
        data.sort_by_key(|embedding| embedding.index);
        let embeddings = data
            .into_iter()
            .map(|embedding| embedding.embedding)
            .collect();

        let usage = match response.usage {
            Some(usage) => Usage {
                tokens: usage.total_tokens,
                input_tokens: Some(usage.prompt_tokens),
                output_tokens: None,
            },
            None => Usage::default(),
        };

        Ok(EmbeddingResponse { embeddings, usage })
    }

    async fn stream(&self, prompt: &str, options: &CallOptions) -> AiResult<StreamResponse> {
        require_prompt(prompt)?;

        let body = self.request_body(
            vec![OpenAiMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            options,
            true,
        );
        let request_id = http::new_request_id();
        let url = format!("{}/chat/completions", self.config.base_url);
        http::log_request(NAME, &url, request_id);

        // No retry wrapper: a partially consumed stream cannot be replayed.
        // The timeout race only covers connection establishment; fragment
        // delivery is unbounded.
        let response = resilience::with_timeout(NAME, self.config.timeout, async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(self.config.api_key.expose_secret())
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
            .bearer_auth(self.config.api_key.expose_secret())
            .send();

        match tokio::time::timeout(self.config.timeout, probe).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}
