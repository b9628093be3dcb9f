//! Application configuration management.
//!
//! Settings are layered: built-in defaults, then a JSON file (`config.json`
//! unless another path is given), then `MEETUP_*` environment variables.
//! The merged result is validated before any network activity happens.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::api::DEFAULT_ENDPOINT;
use crate::utils::RetryConfig;

/// Config file read when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RATE_LIMIT_DELAY_SECS: f64 = 1.0;

const ENV_API_KEY: &str = "MEETUP_API_KEY";
const ENV_OAUTH_TOKEN: &str = "MEETUP_OAUTH_TOKEN";
const ENV_NETWORK_ID: &str = "MEETUP_NETWORK_ID";
const ENV_BASE_URL: &str = "MEETUP_BASE_URL";
const ENV_TIMEOUT: &str = "MEETUP_TIMEOUT";
const ENV_MAX_RETRIES: &str = "MEETUP_MAX_RETRIES";
const ENV_RATE_LIMIT_DELAY: &str = "MEETUP_RATE_LIMIT_DELAY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Missing required configuration: {}. Set environment variables or add to config file.",
        .0.join(", ")
    )]
    Missing(Vec<&'static str>),

    #[error("Invalid {key} value: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),

    #[error("Error reading config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Validated runtime settings.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub oauth_token: String,
    pub network_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit_delay_secs: f64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"***")
            .field("oauth_token", &"***")
            .field("network_id", &self.network_id)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("rate_limit_delay_secs", &self.rate_limit_delay_secs)
            .finish()
    }
}

impl Config {
    /// Per-request HTTP timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy for GraphQL calls: `max_retries` attempts (at least one),
    /// backing off from `rate_limit_delay`.
    pub fn retry_config(&self) -> RetryConfig {
        let api = RetryConfig::api();
        let base_delay =
            Duration::try_from_secs_f64(self.rate_limit_delay_secs).unwrap_or(api.base_delay);
        api.with_max_attempts(self.max_retries.max(1))
            .with_base_delay(base_delay)
    }
}

/// Shape of the JSON config file; every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_key: Option<String>,
    oauth_token: Option<String>,
    network_id: Option<String>,
    base_url: Option<String>,
    timeout: Option<i64>,
    max_retries: Option<i64>,
    rate_limit_delay: Option<f64>,
}

/// Merged but not yet validated settings.
#[derive(Debug)]
struct RawSettings {
    api_key: Option<String>,
    oauth_token: Option<String>,
    network_id: Option<String>,
    base_url: String,
    timeout: i64,
    max_retries: i64,
    rate_limit_delay: f64,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            oauth_token: None,
            network_id: None,
            base_url: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS as i64,
            max_retries: DEFAULT_MAX_RETRIES as i64,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY_SECS,
        }
    }
}

impl RawSettings {
    fn apply_file(&mut self, file: FileConfig) {
        if file.api_key.is_some() {
            self.api_key = file.api_key;
        }
        if file.oauth_token.is_some() {
            self.oauth_token = file.oauth_token;
        }
        if file.network_id.is_some() {
            self.network_id = file.network_id;
        }
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(timeout) = file.timeout {
            self.timeout = timeout;
        }
        if let Some(max_retries) = file.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(delay) = file.rate_limit_delay {
            self.rate_limit_delay = delay;
        }
    }

    /// Environment values win; empty variables count as unset.
    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = var(ENV_OAUTH_TOKEN) {
            self.oauth_token = Some(v);
        }
        if let Some(v) = var(ENV_NETWORK_ID) {
            self.network_id = Some(v);
        }
        if let Some(v) = var(ENV_BASE_URL) {
            self.base_url = v;
        }
        if let Some(v) = var(ENV_TIMEOUT) {
            self.timeout = parse_env("timeout", &v)?;
        }
        if let Some(v) = var(ENV_MAX_RETRIES) {
            self.max_retries = parse_env("max_retries", &v)?;
        }
        if let Some(v) = var(ENV_RATE_LIMIT_DELAY) {
            self.rate_limit_delay = parse_env("rate_limit_delay", &v)?;
        }
        Ok(())
    }

    fn validate(self) -> Result<Config, ConfigError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let missing: Vec<&'static str> = [
            ("api_key", &self.api_key),
            ("oauth_token", &self.oauth_token),
            ("network_id", &self.network_id),
        ]
        .into_iter()
        .filter(|(_, value)| !present(*value))
        .map(|(key, _)| key)
        .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let timeout_secs = u64::try_from(self.timeout)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| ConfigError::Invalid("Timeout must be a positive integer".to_string()))?;
        let max_retries = u32::try_from(self.max_retries).map_err(|_| {
            ConfigError::Invalid("Max retries must be a non-negative integer".to_string())
        })?;
        if !self.rate_limit_delay.is_finite() || self.rate_limit_delay < 0.0 {
            return Err(ConfigError::Invalid(
                "Rate limit delay must be a non-negative number".to_string(),
            ));
        }
        if Duration::try_from_secs_f64(self.rate_limit_delay).is_err() {
            return Err(ConfigError::Invalid(
                "Rate limit delay is out of range".to_string(),
            ));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(
                "Base URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Config {
            api_key: self.api_key.unwrap_or_default().trim().to_string(),
            oauth_token: self.oauth_token.unwrap_or_default().trim().to_string(),
            network_id: self.network_id.unwrap_or_default().trim().to_string(),
            base_url: self.base_url,
            timeout_secs,
            max_retries,
            rate_limit_delay_secs: self.rate_limit_delay,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn load_file(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let file = serde_json::from_str(&contents).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(file))
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Loads, validates and caches the [`Config`].
pub struct ConfigManager {
    path: PathBuf,
    env: EnvLookup,
    cached: Option<Config>,
}

impl ConfigManager {
    /// Read the process environment and `path` (or `config.json`).
    pub fn new(path: Option<PathBuf>) -> Self {
        Self::with_env(path, |name| std::env::var(name).ok())
    }

    /// Use `env` in place of the process environment.
    pub fn with_env<F>(path: Option<PathBuf>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            env: Box::new(env),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached config, loading it on first use.
    pub fn load(&mut self) -> Result<Config, ConfigError> {
        if let Some(config) = &self.cached {
            return Ok(config.clone());
        }

        let mut settings = RawSettings::default();
        if let Some(file) = load_file(&self.path)? {
            settings.apply_file(file);
        }
        settings.apply_env(&self.env)?;
        let config = settings.validate()?;

        self.cached = Some(config.clone());
        Ok(config)
    }

    /// Drop the cached config and load again.
    pub fn reload(&mut self) -> Result<Config, ConfigError> {
        self.cached = None;
        self.load()
    }
}
