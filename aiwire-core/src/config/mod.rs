//! Configuration loading and validation
//!
//! Config files are YAML or JSON with `${ENV_VAR}` placeholders, resolved
//! against the process environment before parsing. Validation is eager:
//! a bad file fails the load, not the first call that happens to need the
//! broken field.

mod env;
mod error;
mod schema;
mod secrets;

pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{DriverConfig, ManagerConfig, ServiceConfig};
pub use secrets::SecretString;

use std::fs;
use std::path::Path;

/// Load a manager configuration from a YAML file.
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<ManagerConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    let interpolated = env::interpolate_env_vars(&content)?;

    let config: ManagerConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;

    config.validate()?;
    Ok(config)
}

/// Load a manager configuration from a JSON file.
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<ManagerConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    let interpolated = env::interpolate_env_vars(&content)?;

    let config: ManagerConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;

    config.validate()?;
    Ok(config)
}
