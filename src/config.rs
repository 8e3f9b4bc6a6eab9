//! Configuration management for DocChat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{DocChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for DocChat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Local session store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chat behavior settings
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Backend API configuration
///
/// The base URL is read once at startup; every endpoint is resolved
/// against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the document QA server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// TCP connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum silence between chunks of a chat stream (seconds)
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_secs: u64,

    /// Timeout for non-streaming requests such as upload and health (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_stream_idle_timeout() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            stream_idle_timeout_secs: default_stream_idle_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite database; `None` uses the platform data directory
    #[serde(default)]
    pub db_path: Option<String>,

    /// Quiet period before an auto-save is written (milliseconds)
    #[serde(default = "default_autosave_delay")]
    pub autosave_delay_ms: u64,
}

fn default_autosave_delay() -> u64 {
    1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            autosave_delay_ms: default_autosave_delay(),
        }
    }
}

/// Chat behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Text that replaces an assistant message whose stream failed
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

fn default_error_message() -> String {
    "Sorry, I ran into a problem answering that. Please try again.".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            error_message: default_error_message(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DocChatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| DocChatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("DOCCHAT_API_BASE_URL") {
            tracing::debug!(base_url = %base_url, "Env override: DOCCHAT_API_BASE_URL");
            self.api.base_url = base_url;
        }

        if let Some(v) = parse_env_u64("DOCCHAT_CONNECT_TIMEOUT_SECS") {
            self.api.connect_timeout_secs = v;
        }

        if let Some(v) = parse_env_u64("DOCCHAT_STREAM_IDLE_TIMEOUT_SECS") {
            self.api.stream_idle_timeout_secs = v;
        }

        if let Some(v) = parse_env_u64("DOCCHAT_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v;
        }

        if let Ok(db_path) = std::env::var("DOCCHAT_SESSIONS_DB") {
            tracing::debug!(db_path = %db_path, "Env override: DOCCHAT_SESSIONS_DB");
            self.storage.db_path = Some(db_path);
        }

        if let Some(v) = parse_env_u64("DOCCHAT_AUTOSAVE_DELAY_MS") {
            self.storage.autosave_delay_ms = v;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
        if let Some(api_url) = &cli.api_url {
            self.api.base_url = api_url.clone();
        }
        if let Some(storage_path) = &cli.storage_path {
            self.storage.db_path = Some(storage_path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| {
            DocChatError::Config(format!(
                "api.base_url '{}' is not a valid URL: {}",
                self.api.base_url, e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(DocChatError::Config(format!(
                "api.base_url must use http or https, got '{}'",
                url.scheme()
            ))
            .into());
        }

        if self.api.connect_timeout_secs == 0 {
            return Err(DocChatError::Config(
                "api.connect_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.api.stream_idle_timeout_secs == 0 {
            return Err(DocChatError::Config(
                "api.stream_idle_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.api.request_timeout_secs == 0 {
            return Err(DocChatError::Config(
                "api.request_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.autosave_delay_ms == 0 {
            return Err(DocChatError::Config(
                "storage.autosave_delay_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.error_message.trim().is_empty() {
            return Err(
                DocChatError::Config("chat.error_message cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

fn parse_env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(v) => {
            tracing::debug!(value = v, "Env override: {}", name);
            Some(v)
        }
        Err(_) => {
            tracing::warn!("Invalid {}: {}", name, raw);
            None
        }
    }
}
