//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable selecting the listening port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => write!(f, "Invalid {}: '{}'", var, value),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load the effective configuration.
///
/// Starts from the TOML file at `path`, or the defaults without one, then
/// applies `PORT` and finally `port_override`, and validates the result.
pub fn load_config(path: Option<&Path>, port_override: Option<u16>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    if let Some(port) = port_override {
        config.listener.port = port;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the `PORT` override. An unset or empty variable leaves the config alone.
pub fn apply_env_overrides(config: &mut ProxyConfig) -> Result<(), ConfigError> {
    apply_port(config, std::env::var(PORT_ENV).ok().as_deref())
}

fn apply_port(config: &mut ProxyConfig, value: Option<&str>) -> Result<(), ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(()),
        Some(raw) => {
            config.listener.port = raw.parse().map_err(|_| ConfigError::Env {
                var: PORT_ENV,
                value: raw.to_string(),
            })?;
            Ok(())
        }
    }
}
