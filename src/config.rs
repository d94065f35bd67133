//! Configuration System
//!
//! Explicit configuration passed into the runner, dispatcher, and provider client at
//! construction. Loaded in layers (defaults, global file, workspace files, environment)
//! and validated before use.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use merge::merge_policy::default_store_path;

/// Environment variable prefix for overrides (`DIALOGFORGE__PROVIDER__API_KEY`, ...)
pub const ENV_PREFIX: &str = "DIALOGFORGE";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Job runner tuning
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generation API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible endpoint root
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; falls back to OPENAI_API_KEY when unset
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used when a job does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default)]
    pub default_temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            default_model: default_model(),
            default_temperature: 0.0,
            max_tokens: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Job runner tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Attempts per item before the job is stopped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff time unit; the wait before retry n is `2^n` units
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Jobs allowed to run at once in one process
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_max_concurrent_jobs() -> usize {
    4
}

impl RunnerConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl StorageConfig {
    /// Store path with relative paths taken from the workspace root
    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Provider(String),
    Runner(String),
    Storage(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Runner(msg) => write!(f, "Runner: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!(
                "base_url '{}' must start with http:// or https://",
                self.base_url
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err("default_model cannot be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(format!(
                "default_temperature {} out of range (0.0-2.0)",
                self.default_temperature
            ));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err("timeouts must be at least one second".to_string());
        }
        Ok(())
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.max_attempts > 16 {
            return Err(format!(
                "max_attempts {} too large (backoff would exceed 2^16 units)",
                self.max_attempts
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be at least 1".to_string());
        }
        Ok(())
    }
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.runner.validate() {
            errors.push(ValidationError::Runner(e));
        }
        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "store_path cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Copy safe to print: secrets replaced
    pub fn redacted(&self) -> AppConfig {
        let mut copy = self.clone();
        if copy.provider.api_key.is_some() {
            copy.provider.api_key = Some("***".to_string());
        }
        copy
    }
}
