//! # Application Configuration
//!
//! Defines the `askdb` configuration and loads it in layers, later layers
//! overriding earlier ones:
//!
//! 1. Programmatic defaults.
//! 2. An optional `config.yml`, with `${VAR}` placeholders substituted from the environment.
//! 3. Plain environment variables for top-level keys (`SCHEMA_CACHE_TTL_SECS`, `LOG_LEVEL`, ...).
//! 4. `ASKDB_`-prefixed variables for nested keys (`ASKDB_PROVIDER__MODEL_NAME`).
//! 5. The `AI_PROVIDER`, `AI_API_URL`, `AI_API_KEY` and `AI_MODEL` shortcuts.

use askdb::constants::{
    DEFAULT_HISTORY_FILE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCHEMA_CACHE_TTL_SECS,
};
use askdb::providers::db::postgrest::DEFAULT_RPC_FUNCTION;
use askdb::AiProviderConfig;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// The file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").expect("valid placeholder regex")
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    General(String),
    #[error("{0}")]
    NotFound(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Lifetime of a cached schema context. Loaded from `SCHEMA_CACHE_TTL_SECS`.
    #[serde(default = "default_schema_cache_ttl_secs")]
    pub schema_cache_ttl_secs: u64,
    /// Log filter used when `RUST_LOG` is not set. Loaded from `LOG_LEVEL`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON Lines file receiving every query attempt. Loaded from `HISTORY_PATH`.
    #[serde(default = "default_history_path")]
    pub history_path: String,
    /// Timeout for requests to the remote database. Loaded from `DATABASE_TIMEOUT_SECS`.
    #[serde(default = "default_request_timeout_secs")]
    pub database_timeout_secs: u64,
    /// Timeout for requests to the AI provider. Loaded from `AI_TIMEOUT_SECS`.
    #[serde(default = "default_request_timeout_secs")]
    pub ai_timeout_secs: u64,
    /// The RPC function executing SQL on the database. Loaded from `RPC_FUNCTION`.
    #[serde(default = "default_rpc_function")]
    pub rpc_function: String,
    /// Table names probed when the catalog is not readable. Empty means the built-in list.
    #[serde(default)]
    pub sample_tables: Vec<String>,
    /// The AI provider generating SQL.
    pub provider: AiProviderConfig,
}

fn default_schema_cache_ttl_secs() -> u64 {
    DEFAULT_SCHEMA_CACHE_TTL_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_history_path() -> String {
    DEFAULT_HISTORY_FILE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_rpc_function() -> String {
    DEFAULT_RPC_FUNCTION.to_string()
}

// Reads a file and substitutes `${VAR}` placeholders. Ok(None) if it does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let expanded = ENV_PLACEHOLDER.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded.into_owned()))
}

/// Reads an environment variable, treating an empty value as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Loads the configuration.
///
/// An explicit `config_path_override` must exist; the default `config.yml` is optional.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder()
        .set_default("provider.provider", "gemini")?
        .set_default("provider.model_name", "gemini-2.0-flash")?;

    let config_path = config_path_override.unwrap_or(DEFAULT_CONFIG_FILE);
    match read_and_substitute(config_path)? {
        Some(content) => {
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if config_path_override.is_some() => {
            return Err(ConfigError::NotFound(format!(
                "Config file not found at '{config_path}'."
            )));
        }
        None => {}
    }

    let settings = builder
        .add_source(Environment::default().try_parsing(true))
        .add_source(
            Environment::with_prefix("ASKDB")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("sample_tables"),
        )
        .set_override_option("provider.provider", non_empty_var("AI_PROVIDER"))?
        .set_override_option("provider.api_url", non_empty_var("AI_API_URL"))?
        .set_override_option("provider.api_key", non_empty_var("AI_API_KEY"))?
        .set_override_option("provider.model_name", non_empty_var("AI_MODEL"))?
        .build()?;

    Ok(settings.try_deserialize()?)
}
