//! Canonical request/response types shared by every provider driver

pub mod stream;
pub mod types;

pub use stream::TextStream;
pub use types::{
    CallOptions, ChatMessage, ChatResponse, EmbedInput, EmbeddingResponse, Role, StreamResponse,
    TextResponse, Usage,
};
