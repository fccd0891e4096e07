//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::SentinelConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { key: String, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { key, value } => {
                write!(f, "Invalid value '{}' for environment variable {}", value, key)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, with `SENTINEL_*`
/// environment overrides applied on top.
pub fn load_config(path: &Path) -> Result<SentinelConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: SentinelConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, std::env::vars())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply recognised `SENTINEL_*` variables. Unknown keys are ignored.
pub fn apply_env_overrides<I>(config: &mut SentinelConfig, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        match key.as_str() {
            "SENTINEL_INTERVAL_SECS" => config.monitor.interval_secs = parse_env(&key, &value)?,
            "SENTINEL_PROBE_TIMEOUT_MS" => config.monitor.probe_timeout_ms = parse_env(&key, &value)?,
            "SENTINEL_FAILOVER_TIMEOUT_SECS" => {
                config.failover.wait_timeout_secs = parse_env(&key, &value)?
            }
            "SENTINEL_LAG_THRESHOLD_SECS" => {
                config.monitor.replication_lag_threshold_secs = parse_env(&key, &value)?
            }
            "SENTINEL_LOG_LEVEL" => config.observability.log_level = value,
            _ => {}
        }
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}
