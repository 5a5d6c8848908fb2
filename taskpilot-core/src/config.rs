//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/taskpilot/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/taskpilot/` (~/.config/taskpilot/)
//! - Data: `$XDG_DATA_HOME/taskpilot/` (~/.local/share/taskpilot/)
//! - State/Logs: `$XDG_STATE_HOME/taskpilot/` (~/.local/state/taskpilot/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `backend.base_url`
pub const BACKEND_URL_ENV: &str = "TASKPILOT_BACKEND_URL";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Model provider used by the assistant flows
    #[serde(default)]
    pub llm: LlmConfig,

    /// Task backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider type
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model to use (defaults per provider)
    pub model: Option<String>,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// Upper bound for a single model call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            endpoint: None,
            api_key: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Configured model, or the provider's default
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

fn default_llm_timeout() -> u64 {
    60
}

/// Supported LLM providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Ollama,
    Claude,
    OpenAI,
}

impl LlmProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAI => "https://api.openai.com",
        }
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::Ollama => "llama3.2",
            LlmProvider::Claude => "claude-3-5-haiku-latest",
            LlmProvider::OpenAI => "gpt-4o-mini",
        }
    }

    /// Environment variable holding the API key, if the provider needs one
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Gemini => Some("GEMINI_API_KEY"),
            LlmProvider::Ollama => None,
            LlmProvider::Claude => Some("ANTHROPIC_API_KEY"),
            LlmProvider::OpenAI => Some("OPENAI_API_KEY"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Ollama => "ollama",
            LlmProvider::Claude => "claude",
            LlmProvider::OpenAI => "openai",
        }
    }
}

/// REST backend configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the task API (e.g., `https://api.example.com/api/`)
    pub base_url: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl BackendConfig {
    /// Base URL from the environment override or the config file
    pub fn resolved_base_url(&self) -> Option<String> {
        std::env::var(BACKEND_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.base_url.clone())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let Some(url) = self.resolved_base_url() else {
            return Err(Error::Config(format!(
                "backend.base_url (or {}) is required",
                BACKEND_URL_ENV
            )));
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "backend.base_url must be an http(s) URL, got {}",
                url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "backend.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_backend_timeout() -> u64 {
    10
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/taskpilot/config.toml` (~/.config/taskpilot/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("taskpilot").join("config.toml")
    }

    /// Returns the data directory path (for exports)
    ///
    /// `$XDG_DATA_HOME/taskpilot/` (~/.local/share/taskpilot/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("taskpilot")
    }

    /// Returns the state directory path (for logs and the session token)
    ///
    /// `$XDG_STATE_HOME/taskpilot/` (~/.local/state/taskpilot/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("taskpilot")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/taskpilot/taskpilot.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("taskpilot.log")
    }

    /// Returns the persisted auth token path
    ///
    /// `$XDG_STATE_HOME/taskpilot/auth_token.json`
    pub fn token_path() -> PathBuf {
        Self::state_dir().join("auth_token.json")
    }
}
