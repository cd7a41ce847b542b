use super::types::Config;
use super::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use crate::source::duckdb::is_valid_table_name;
use crate::store::BucketLocation;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in '{path}': {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&yaml, &path.display().to_string())
}

/// Parse config text. `origin` names the text in error messages.
pub fn parse_config(yaml: &str, origin: &str) -> Result<Config, ConfigError> {
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    let mut config: Config =
        serde_yaml::from_str(&yaml).map_err(|source| ConfigError::YamlParse {
            path: origin.to_string(),
            source,
        })?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml: &str) -> Result<(), ConfigError> {
    let names = unexpanded_env_vars(yaml);
    match names.as_slice() {
        [] => Ok(()),
        [name] => Err(ConfigError::Validation(format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            name
        ))),
        _ => Err(ConfigError::Validation(format!(
            "Environment variables are not set: {}",
            names.join(", ")
        ))),
    }
}

fn expand_paths(config: &mut Config) {
    config.tickets.source.path = expand_tilde(&config.tickets.source.path);
    config.warehouse.path = expand_tilde(&config.warehouse.path);
    if let Some(dir) = config.logs.local_dir.as_mut() {
        *dir = expand_tilde(dir);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.object_store.url.trim().is_empty() {
        errors.push("object_store.url cannot be empty".to_string());
    } else if let Err(e) = BucketLocation::parse_url(&config.object_store.url) {
        errors.push(format!("object_store.url: {}", e));
    }

    if config.object_store.list_page_size == 0 {
        errors.push("object_store.list_page_size must be greater than 0".to_string());
    }

    if config.logs.suffix.is_empty() {
        errors.push("logs.suffix cannot be empty".to_string());
    }

    if config.tickets.staging_key.trim().is_empty() {
        errors.push("tickets.staging_key cannot be empty".to_string());
    }

    if !is_valid_table_name(&config.tickets.source.table) {
        errors.push(format!(
            "tickets.source.table '{}' is not a plain table name",
            config.tickets.source.table
        ));
    }

    if config.workflow.retry_delay > MAX_RETRY_DELAY {
        errors.push("workflow.retry_delay cannot exceed 24h".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
