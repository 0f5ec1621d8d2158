//! Pull-based text fragment stream
//!
//! A finite, non-restartable sequence of text fragments backed by an open
//! provider connection. The consumer pulls with [`TextStream::next`] and may
//! stop at any point; dropping or closing the stream drops the underlying
//! response body, which releases the connection.

use crate::error::AiError;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Lazy sequence of text fragments from a streaming completion
pub struct TextStream {
    inner: Option<BoxStream<'static, Result<String, AiError>>>,
}

impl TextStream {
    /// Wrap a raw fragment stream.
    pub fn new(inner: BoxStream<'static, Result<String, AiError>>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Stream over pre-computed fragments; used by tests and adapters.
    pub fn from_fragments(fragments: Vec<Result<String, AiError>>) -> Self {
        Self::new(futures::stream::iter(fragments).boxed())
    }

    /// Pull the next fragment. Returns `None` once the provider is done or
    /// after [`close`](Self::close).
    pub async fn next(&mut self) -> Option<Result<String, AiError>> {
        let stream = self.inner.as_mut()?;
        let item = stream.next().await;
        if item.is_none() {
            self.inner = None;
        }
        item
    }

    /// Release the underlying connection without draining. Idempotent.
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// Whether the stream has ended or been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Drain the remaining fragments into a single string.
    pub async fn collect_text(&mut self) -> Result<String, AiError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl futures::Stream for TextStream {
    type Item = Result<String, AiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut() {
            Some(stream) => {
                let polled = stream.as_mut().poll_next(cx);
                if matches!(polled, Poll::Ready(None)) {
                    self.inner = None;
                }
                polled
            }
            None => Poll::Ready(None),
        }
    }
}

impl fmt::Debug for TextStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}
