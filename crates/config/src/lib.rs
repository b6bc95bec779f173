//! Configuration loading, validation, and management for Arbor.
//!
//! Loads configuration from `~/.arbor/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.arbor/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Token budgets and context-window housekeeping
    #[serde(default)]
    pub context: ContextConfig,

    /// Token estimation heuristic
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Session persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Prompt token limit used when a caller gives none.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,

    /// Budget for standalone conversation optimization.
    #[serde(default = "default_optimize_max_tokens")]
    pub optimize_max_tokens: usize,

    /// Held back from history for the system prompt and current query.
    #[serde(default = "default_reserved_tokens")]
    pub reserved_tokens: usize,

    /// Fraction of the limit history is recompressed to when a prompt overflows.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,

    #[serde(default = "default_max_relevant_tools")]
    pub max_relevant_tools: usize,

    /// Idle time after which a context window is evicted.
    #[serde(default = "default_context_max_age_ms")]
    pub context_max_age_ms: u64,
}

fn default_max_tokens() -> usize {
    8000
}
fn default_optimize_max_tokens() -> usize {
    4000
}
fn default_reserved_tokens() -> usize {
    1000
}
fn default_safety_margin() -> f64 {
    0.8
}
fn default_max_relevant_tools() -> usize {
    5
}
fn default_context_max_age_ms() -> u64 {
    3_600_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: default_max_tokens(),
            optimize_max_tokens: default_optimize_max_tokens(),
            reserved_tokens: default_reserved_tokens(),
            safety_margin: default_safety_margin(),
            max_relevant_tools: default_max_relevant_tools(),
            context_max_age_ms: default_context_max_age_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    /// Per-message framing cost for user and assistant messages.
    #[serde(default = "default_message_overhead")]
    pub message_overhead: usize,

    /// Per-message framing cost for system messages.
    #[serde(default = "default_system_overhead")]
    pub system_overhead: usize,
}

fn default_chars_per_token() -> usize {
    4
}
fn default_message_overhead() -> usize {
    10
}
fn default_system_overhead() -> usize {
    20
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            message_overhead: default_message_overhead(),
            system_overhead: default_system_overhead(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "file" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Session directory for the file backend (default `~/.arbor/sessions`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_storage_backend() -> String {
    "file".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

impl StorageConfig {
    /// The configured session directory, or the default under the config dir.
    pub fn sessions_dir(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("sessions"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.arbor/config.toml).
    ///
    /// Environment overrides:
    /// - `ARBOR_MAX_TOKENS`
    /// - `ARBOR_STORAGE_BACKEND`
    /// - `ARBOR_STORAGE_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(raw) = std::env::var("ARBOR_MAX_TOKENS") {
            config.context.default_max_tokens = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!("ARBOR_MAX_TOKENS is not a number: {raw}"))
            })?;
        }

        if let Ok(backend) = std::env::var("ARBOR_STORAGE_BACKEND") {
            config.storage.backend = backend;
        }

        if let Ok(path) = std::env::var("ARBOR_STORAGE_PATH") {
            config.storage.path = Some(PathBuf::from(path));
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".arbor")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.reserved_tokens >= self.context.default_max_tokens {
            return Err(ConfigError::ValidationError(
                "reserved_tokens must be smaller than default_max_tokens".into(),
            ));
        }

        if !(self.context.safety_margin > 0.0 && self.context.safety_margin <= 1.0) {
            return Err(ConfigError::ValidationError(
                "safety_margin must be in (0.0, 1.0]".into(),
            ));
        }

        if self.tokens.chars_per_token == 0 {
            return Err(ConfigError::ValidationError(
                "chars_per_token must be > 0".into(),
            ));
        }

        if !matches!(self.storage.backend.as_str(), "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown storage backend '{}' (expected \"file\" or \"memory\")",
                self.storage.backend
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
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
