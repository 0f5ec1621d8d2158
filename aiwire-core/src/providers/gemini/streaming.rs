//! Server-Sent Events parsing for Gemini streaming responses

use super::types::GeminiResponse;
use crate::error::AiError;
use crate::protocol::TextStream;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};

/// Adapt the `streamGenerateContent?alt=sse` byte stream into fragments.
///
/// Each event carries a full `GenerateContentResponse` whose first
/// candidate holds the incremental text. There is no terminator event; the
/// feed ends when the server closes the connection.
pub(super) fn parse_stream(
    provider: &str,
    bytes: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> TextStream {
    let provider = provider.to_string();
    let fragments = bytes.eventsource().filter_map(move |event| {
        let provider = provider.clone();
        async move {
            match event {
                Ok(event) => match serde_json::from_str::<GeminiResponse>(&event.data) {
                    Ok(chunk) => {
                        let text: String = chunk
                            .candidates
                            .into_iter()
                            .next()
                            .and_then(|candidate| candidate.content)
                            .map(|content| {
                                content
                                    .parts
                                    .into_iter()
                                    .map(|part| part.text)
                                    .collect()
                            })
                            .unwrap_or_default();
                        if text.is_empty() {
                            None
                        } else {
                            Some(Ok(text))
                        }
                    }
                    Err(e) => {
                        tracing::warn!(provider, "skipping unparseable stream chunk: {e}");
                        None
                    }
                },
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
    async fn joins_candidate_parts_in_order() {
        let mut stream = parse_stream(
            "gemini",
            sse_body(&[
                r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Once "}]}}]}"#,
                r#"{"candidates":[{"content":{"parts":[{"text":"upon"},{"text":" a time"}]}}]}"#,
                r#"{"candidates":[{"finishReason":"STOP"}]}"#,
            ]),
        );
        assert_eq!(stream.collect_text().await.unwrap(), "Once upon a time");
    }
}
