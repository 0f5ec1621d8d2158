//! aiwire core library
//!
//! A provider-agnostic adapter layer over remote AI completion APIs. One
//! driver contract (generate, chat, embed, stream) is implemented per
//! provider; a shared resilience policy (timeout race + retry with
//! exponential backoff) and a closed error taxonomy sit between every
//! driver and the wire. The [`Manager`] resolves named or default providers
//! from validated configuration.
//!
//! ```no_run
//! use aiwire_core::{CallOptions, Driver, Manager, ManagerConfig, ProviderKind, ServiceConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ManagerConfig::new("openai")
//!     .with_service(ServiceConfig::new("openai", ProviderKind::OpenAi, "sk-..."))
//!     .with_service(ServiceConfig::new("gemini", ProviderKind::Gemini, "..."));
//!
//! let manager = Manager::new(config)?;
//! manager.validate_config()?;
//!
//! let driver = manager.use_driver(None)?;
//! let response = driver.generate("hello", &CallOptions::default()).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub(crate) mod http;
pub mod manager;
pub mod protocol;
pub mod providers;
pub mod resilience;

pub use config::{
    load_from_json, load_from_yaml, ConfigError, DriverConfig, ManagerConfig, SecretString,
    ServiceConfig,
};
pub use error::{classify, AiError, AiResult};
pub use manager::Manager;
pub use protocol::{
    CallOptions, ChatMessage, ChatResponse, EmbedInput, EmbeddingResponse, Role, StreamResponse,
    TextResponse, TextStream, Usage,
};
pub use providers::{estimate_tokens, Driver, GeminiDriver, OpenAiDriver, ProviderKind};
pub use resilience::RetryPolicy;

/// Returns the version of the aiwire core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
