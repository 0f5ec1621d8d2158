//! OpenAI provider driver

mod client;
mod streaming;
mod types;

pub use client::OpenAiDriver;
