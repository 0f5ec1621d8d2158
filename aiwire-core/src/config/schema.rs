//! Configuration schema with serde support and eager validation

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

/// Root configuration for the manager
///
/// Immutable after construction; the manager validates it eagerly, never
/// lazily.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    /// Name of the provider used when a caller does not pick one. Must
    /// match one of the configured services.
    pub default: String,

    /// Manager-wide request timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Manager-wide retry budget
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Configured provider services, in registration order
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl ManagerConfig {
    /// New configuration with the given default provider and the global
    /// defaults (30s timeout, 3 retries).
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            services: Vec::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.services.push(service);
        self
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|service| service.name == name)
    }

    /// Eager validation: the default must be configured, names must be
    /// unique, API keys must be non-empty, and the timeout must be positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default.is_empty() {
            return Err(ValidationError::required("default"));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::new(
                "timeout_ms",
                ValidationErrorKind::OutOfRange {
                    message: "timeout must be a positive number of milliseconds".to_string(),
                },
            ));
        }

        let mut seen = HashSet::new();
        for (index, service) in self.services.iter().enumerate() {
            if service.name.is_empty() {
                return Err(ValidationError::required(format!("services[{index}].name")));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ValidationError::new(
                    format!("services[{index}].name"),
                    ValidationErrorKind::DuplicateValue {
                        value: service.name.clone(),
                    },
                ));
            }
            if service.api_key.is_empty() {
                return Err(ValidationError::custom(
                    format!("services[{index}].api_key"),
                    format!("provider '{}' has an empty API key", service.name),
                ));
            }
            if let Some(0) = service.timeout_ms {
                return Err(ValidationError::new(
                    format!("services[{index}].timeout_ms"),
                    ValidationErrorKind::OutOfRange {
                        message: "timeout must be a positive number of milliseconds".to_string(),
                    },
                ));
            }
        }

        if self.service(&self.default).is_none() {
            return Err(ValidationError::custom(
                "default",
                format!("default provider '{}' is not configured", self.default),
            ));
        }

        Ok(())
    }
}

/// One configured provider service
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name the service is registered under (usually the provider name)
    pub name: String,

    /// Which provider driver backs this service
    pub provider: ProviderKind,

    /// API key (supports `${ENV_VAR}` interpolation at load time)
    pub api_key: SecretString,

    /// Model override; falls back to the provider's default model
    #[serde(default)]
    pub model: Option<String>,

    /// Per-service timeout override (milliseconds)
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Per-service retry budget override
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Base URL override, mainly for proxies and tests
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, provider: ProviderKind, api_key: impl Into<SecretString>) -> Self {
        Self {
            name: name.into(),
            provider,
            api_key: api_key.into(),
            model: None,
            timeout_ms: None,
            max_retries: None,
            base_url: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Resolve into the settings one driver is constructed from, filling
    /// gaps from the manager-wide values.
    pub fn resolve(&self, manager: &ManagerConfig) -> DriverConfig {
        DriverConfig {
            api_key: self.api_key.clone(),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.provider.default_model().to_string()),
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| self.provider.default_base_url().to_string()),
            timeout: Duration::from_millis(self.timeout_ms.unwrap_or(manager.timeout_ms)),
            max_retries: self.max_retries.unwrap_or(manager.max_retries),
        }
    }
}

/// Fully resolved per-driver settings; immutable after construction
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_provider_config() -> ManagerConfig {
        ManagerConfig::new("openai")
            .with_service(ServiceConfig::new("openai", ProviderKind::OpenAi, "sk-test"))
            .with_service(ServiceConfig::new("gemini", ProviderKind::Gemini, "g-test"))
    }

    #[test]
    fn valid_config_passes() {
        assert!(two_provider_config().validate().is_ok());
    }

    #[test]
    fn missing_default_service_fails() {
        let config = ManagerConfig::new("mistral")
            .with_service(ServiceConfig::new("openai", ProviderKind::OpenAi, "sk-test"));
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("mistral"));
    }

    #[test]
    fn empty_api_key_names_the_provider() {
        let config = ManagerConfig::new("openai")
            .with_service(ServiceConfig::new("openai", ProviderKind::OpenAi, "sk-test"))
            .with_service(ServiceConfig::new("gemini", ProviderKind::Gemini, ""));
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("gemini"));
    }

    #[test]
    fn duplicate_service_names_fail() {
        let config = ManagerConfig::new("openai")
            .with_service(ServiceConfig::new("openai", ProviderKind::OpenAi, "a"))
            .with_service(ServiceConfig::new("openai", ProviderKind::OpenAi, "b"));
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("duplicate"));
    }

    #[test]
    fn resolve_falls_back_to_manager_defaults() {
        let config = two_provider_config().with_timeout_ms(5_000).with_max_retries(1);
        let service = config.service("gemini").unwrap();
        let driver = service.resolve(&config);
        assert_eq!(driver.timeout, Duration::from_millis(5_000));
        assert_eq!(driver.max_retries, 1);
        assert_eq!(driver.model, ProviderKind::Gemini.default_model());
        assert_eq!(driver.base_url, ProviderKind::Gemini.default_base_url());
    }

    #[test]
    fn resolve_prefers_service_overrides() {
        let config = ManagerConfig::new("openai").with_service(
            ServiceConfig::new("openai", ProviderKind::OpenAi, "sk-test")
                .with_model("gpt-4o")
                .with_timeout_ms(1_000)
                .with_max_retries(0)
                .with_base_url("http://localhost:9999/v1"),
        );
        let driver = config.service("openai").unwrap().resolve(&config);
        assert_eq!(driver.model, "gpt-4o");
        assert_eq!(driver.timeout, Duration::from_millis(1_000));
        assert_eq!(driver.max_retries, 0);
        assert_eq!(driver.base_url, "http://localhost:9999/v1");
    }
}
