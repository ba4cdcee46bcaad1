//! Configuration loading, validation, and management for Wegweiser.
//!
//! Loads configuration from `~/.wegweiser/config.toml` with environment
//! variable overrides. Credential validation enumerates **every** missing
//! item, not just the first, so a user fixes their environment in one pass.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which final-answer protocol the deployment speaks.
///
/// The legacy surface embedded `[TASK_COMPLETE]` / `[PAUSE_FOR_INPUT]`
/// markers in prose; the current one uses a strict single-JSON-object
/// final answer with tool-call-based suspension. One mode is picked per
/// deployment — the two are never mixed within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Marker-delimited free text.
    Markers,
    /// Strict JSON final answer, suspension via `request_human_feedback`.
    #[default]
    ToolCalls,
}

/// The root configuration structure.
///
/// Maps directly to `~/.wegweiser/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenAI-compatible API key for the text-generation collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    /// Tavily API key for the web_search tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_api_key: Option<String>,

    /// Base URL of the chat-completions endpoint
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Maximum control-loop cycles per invocation before the loop reports
    /// itself exhausted
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    /// Final-answer protocol for this deployment
    #[serde(default)]
    pub protocol: Protocol,

    /// Override the built-in advisor system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_cycles() -> u32 {
    15
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("tavily_api_key", &redact(&self.tavily_api_key))
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("max_cycles", &self.max_cycles)
            .field("protocol", &self.protocol)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing required credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),
}

impl AppConfig {
    /// Load configuration from the default path (~/.wegweiser/config.toml).
    ///
    /// Environment variables override file values:
    /// - `OPENAI_API_KEY`
    /// - `TAVILY_API_KEY`
    /// - `WEGWEISER_API_BASE`
    /// - `WEGWEISER_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.openai_api_key.is_none() {
            config.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if config.tavily_api_key.is_none() {
            config.tavily_api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if let Ok(base) = std::env::var("WEGWEISER_API_BASE") {
            config.api_base = base;
        }
        if let Ok(model) = std::env::var("WEGWEISER_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wegweiser")
    }

    /// Validate structural settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_cycles == 0 {
            return Err(ConfigError::ValidationError(
                "max_cycles must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Fail fast if any required credential is absent. The error names
    /// every missing variable so one pass fixes the environment.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY".to_string());
        }
        if self.tavily_api_key.is_none() {
            missing.push("TAVILY_API_KEY".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            tavily_api_key: None,
            api_base: default_api_base(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            max_cycles: default_max_cycles(),
            protocol: Protocol::default(),
            system_prompt_override: None,
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }
}
