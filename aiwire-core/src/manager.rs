//! Driver registry and resolver
//!
//! A manager is constructed once at process start from validated
//! configuration and handed to whatever needs it; there is no ambient
//! singleton. Drivers are built eagerly, one per configured service, and
//! never mutated afterwards.

use crate::config::ManagerConfig;
use crate::error::{AiError, AiResult};
use crate::providers::Driver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Holds configured drivers by name and resolves "default" vs named access
#[derive(Debug)]
pub struct Manager {
    config: ManagerConfig,
    drivers: HashMap<String, Arc<dyn Driver>>,
    /// Names in registration order; `drivers` alone cannot preserve it
    order: Vec<String>,
}

impl Manager {
    /// Build a manager from configuration, validating eagerly and
    /// constructing one driver per configured service.
    pub fn new(config: ManagerConfig) -> AiResult<Self> {
        config
            .validate()
            .map_err(|e| AiError::configuration(e.to_string()))?;

        let mut manager = Self {
            drivers: HashMap::new(),
            order: Vec::new(),
            config,
        };

        for service in manager.config.services.clone() {
            let driver = service.provider.create_driver(service.resolve(&manager.config))?;
            info!(
                service = %service.name,
                provider = %service.provider,
                "registered provider driver"
            );
            manager.register_driver(&service.name, driver);
        }

        Ok(manager)
    }

    /// Resolve a driver by name, falling back to the configured default.
    ///
    /// Unknown names fail with [`AiError::DriverNotFound`]; there is no
    /// silent further fallback.
    pub fn use_driver(&self, name: Option<&str>) -> AiResult<Arc<dyn Driver>> {
        let name = name.unwrap_or(&self.config.default);
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| AiError::DriverNotFound {
                name: name.to_string(),
            })
    }

    /// Insert or replace a driver under `name`; last write wins.
    pub fn register_driver(&mut self, name: &str, driver: Arc<dyn Driver>) {
        if self.drivers.insert(name.to_string(), driver).is_none() {
            self.order.push(name.to_string());
        }
    }

    pub fn has_driver(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered driver names, in registration order.
    pub fn available_drivers(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn default_driver_name(&self) -> &str {
        &self.config.default
    }

    /// Startup check: the default must be registered and every configured
    /// service must carry a non-empty API key. Fails on the first
    /// violation, naming the offending provider.
    pub fn validate_config(&self) -> AiResult<()> {
        if !self.has_driver(&self.config.default) {
            return Err(AiError::configuration(format!(
                "default provider '{}' is not registered",
                self.config.default
            )));
        }

        for service in &self.config.services {
            if service.api_key.is_empty() {
                return Err(AiError::configuration(format!(
                    "provider '{}' has an empty API key",
                    service.name
                )));
            }
        }

        Ok(())
    }

    /// Probe every registered driver independently.
    ///
    /// One provider's failing probe must not abort the others, so results
    /// are collected as booleans and nothing propagates.
    pub async fn test_providers(&self) -> HashMap<String, bool> {
        let probes = self.order.iter().map(|name| {
            let driver = Arc::clone(&self.drivers[name]);
            let name = name.clone();
            async move {
                let healthy = driver.is_configured().await;
                debug!(provider = %name, healthy, "provider probe finished");
                (name, healthy)
            }
        });

        futures::future::join_all(probes).await.into_iter().collect()
    }

    /// Release every driver's remote client handle.
    pub fn close(&self) {
        for driver in self.drivers.values() {
            driver.close();
        }
    }
}
