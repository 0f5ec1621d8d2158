//! Server-Sent Events parsing for OpenAI streaming responses

use super::types::OpenAiStreamChunk;
use crate::error::AiError;
use crate::protocol::TextStream;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};

/// Adapt the raw SSE byte stream into text fragments.
///
/// OpenAI sends `data: {json}` events and terminates with `data: [DONE]`.
/// Chunks that fail to parse are skipped rather than ending the stream; a
/// transport error ends it with an error item.
pub(super) fn parse_stream(
    provider: &str,
    bytes: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> TextStream {
    let provider = provider.to_string();
    let fragments = bytes.eventsource().filter_map(move |event| {
        let provider = provider.clone();
        async move {
            match event {
                Ok(event) => {
                    if event.data == "[DONE]" {
                        return None;
                    }
                    match serde_json::from_str::<OpenAiStreamChunk>(&event.data) {
                        Ok(chunk) => chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content)
                            .filter(|content| !content.is_empty())
                            .map(Ok),
                        Err(e) => {
                            tracing::warn!(provider, "skipping unparseable stream chunk: {e}");
                            None
                        }
                    }
                }
                Err(e) => Some(Err(AiError::Service {
                    provider,
                    message: format!("stream error: {e}"),
                    status: None,
                })),
            }
        }
    });

    TextStream::new(fragments.boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse_body(events: &[&str]) -> impl Stream<Item = Result<Bytes, reqwest::Error>> {
        let body = events
            .iter()
            .map(|data| format!("data: {data}\n\n"))
            .collect::<String>();
        futures::stream::once(async move { Ok(Bytes::from(body)) })
    }

    #[tokio::test]
    async fn collects_fragments_and_stops_at_done() {
        let mut stream = parse_stream(
            "openai",
            sse_body(&[
                r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#,
                r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
                r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ]),
        );
        assert_eq!(stream.collect_text().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn malformed_chunks_are_skipped() {
        let mut stream = parse_stream(
            "openai",
            sse_body(&[
                r#"{"choices":[{"delta":{"content":"ok"}}]}"#,
                "{ not json",
                r#"{"choices":[{"delta":{"content":"!"}}]}"#,
                "[DONE]",
            ]),
        );
        assert_eq!(stream.collect_text().await.unwrap(), "ok!");
    }
}
