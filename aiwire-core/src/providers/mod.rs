//! Provider drivers and the contract they share
//!
//! Each driver translates the uniform operation set into one provider's
//! wire format and composes the resilience policy and error taxonomy around
//! its remote calls. Adding a provider means adding a [`ProviderKind`]
//! variant and a driver module, not subclassing.

pub mod driver;
pub mod gemini;
pub mod openai;

pub use driver::{estimate_tokens, Driver, ProviderKind};
pub use gemini::GeminiDriver;
pub use openai::OpenAiDriver;
