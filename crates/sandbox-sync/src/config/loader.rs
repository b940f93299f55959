use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::config::schema::SyncConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Default config location: `<config dir>/sandbox-sync/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sandbox-sync").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads `path` if given, else the default location if it exists, else defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    match default_config_path() {
        Some(default_path) if default_path.exists() => {
            log::debug!("Loading config from {:?}", default_path);
            load_config(default_path)
        }
        _ => Ok(SyncConfig::default()),
    }
}

pub fn load_config_from_str(content: &str) -> Result<SyncConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: SyncConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &SyncConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if let Err(e) = Url::parse(&config.github.api_url) {
        return Err(ConfigError::Validation {
            message: format!("Invalid github.api_url '{}': {}", config.github.api_url, e),
        });
    }

    for (field, value) in [
        ("git.origin_remote", &config.git.origin_remote),
        ("git.gist_remote", &config.git.gist_remote),
        ("git.gist_default_branch", &config.git.gist_default_branch),
    ] {
        if value.trim().is_empty() || value.contains(char::is_whitespace) {
            return Err(ConfigError::Validation {
                message: format!("{} must be a non-empty name without spaces", field),
            });
        }
    }

    if let Some(url) = &config.polling.deployment_status_url {
        if let Err(e) = Url::parse(url) {
            return Err(ConfigError::Validation {
                message: format!("Invalid polling.deployment_status_url '{}': {}", url, e),
            });
        }
    }

    if config.polling.deployment_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "polling.deployment_interval_ms must be greater than zero".to_string(),
        });
    }

    Ok(())
}
