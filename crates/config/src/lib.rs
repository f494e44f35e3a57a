//! Configuration loading, validation, and management for Cartloop.
//!
//! Loads configuration from `~/.cartloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.cartloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Oracle API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default)]
    pub provider: ProviderConfig,

    /// Loop driver and session settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Payment API settings
    #[serde(default)]
    pub commerce: CommerceConfig,

    /// Observability sink settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("commerce", &self.commerce)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Retries for transient failures, inside the client
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Oracle calls allowed per processing cycle
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Bound on each oracle call, tool execution and sink call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Number of recent messages rendered into the oracle context
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    8
}
fn default_call_timeout() -> u64 {
    30
}
fn default_history_window() -> usize {
    6
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            call_timeout_secs: default_call_timeout(),
            history_window: default_history_window(),
            system_prompt: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CommerceConfig {
    #[serde(default = "default_commerce_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// TTL of the per-agent catalog cache
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Currency used when a price is created without one
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_commerce_url() -> String {
    "https://api.stripe.com/v1".into()
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_currency() -> String {
    "usd".into()
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            api_url: default_commerce_url(),
            api_key: None,
            cache_ttl_secs: default_cache_ttl(),
            currency: default_currency(),
        }
    }
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("currency", &self.currency)
            .finish()
    }
}

/// Where flushed traces go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    /// Keep traces in memory only
    #[default]
    None,
    /// Append JSON lines to a local file
    Jsonl,
    /// POST batches to an HTTP endpoint
    Http,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Project name attached to every session
    #[serde(default = "default_project")]
    pub project: String,

    #[serde(default)]
    pub exporter: ExporterKind,

    #[serde(default = "default_jsonl_path")]
    pub jsonl_path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_flush_timeout")]
    pub flush_timeout_secs: u64,
}

fn default_project() -> String {
    "cartloop".into()
}
fn default_jsonl_path() -> PathBuf {
    AppConfig::config_dir().join("traces.jsonl")
}
fn default_flush_timeout() -> u64 {
    20
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project: default_project(),
            exporter: ExporterKind::default(),
            jsonl_path: default_jsonl_path(),
            endpoint: None,
            api_key: None,
            flush_timeout_secs: default_flush_timeout(),
        }
    }
}

impl std::fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("enabled", &self.enabled)
            .field("project", &self.project)
            .field("exporter", &self.exporter)
            .field("jsonl_path", &self.jsonl_path)
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("flush_timeout_secs", &self.flush_timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.cartloop/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply environment overrides through `lookup`.
    ///
    /// Keys already present in the file win for secrets; model and URLs
    /// are always overridden when the variable is set.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("CARTLOOP_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("CARTLOOP_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("CARTLOOP_BASE_URL") {
            self.provider.base_url = url;
        }
        if self.commerce.api_key.is_none() {
            self.commerce.api_key =
                lookup("CARTLOOP_COMMERCE_KEY").or_else(|| lookup("STRIPE_SECRET_KEY"));
        }
        if let Some(endpoint) = lookup("CARTLOOP_TELEMETRY_ENDPOINT") {
            self.telemetry.endpoint = Some(endpoint);
        }
        if self.telemetry.api_key.is_none() {
            self.telemetry.api_key = lookup("CARTLOOP_TELEMETRY_KEY");
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cartloop")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.agent.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.call_timeout_secs must be at least 1".into(),
            ));
        }
        if self.agent.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_window must be at least 1".into(),
            ));
        }
        if self.telemetry.flush_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.flush_timeout_secs must be at least 1".into(),
            ));
        }
        if self.telemetry.exporter == ExporterKind::Http && self.telemetry.endpoint.is_none() {
            return Err(ConfigError::ValidationError(
                "telemetry.exporter = \"http\" requires telemetry.endpoint".into(),
            ));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            provider: ProviderConfig::default(),
            agent: AgentConfig::default(),
            commerce: CommerceConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
