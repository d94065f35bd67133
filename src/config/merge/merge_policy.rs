//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use directories::ProjectDirs;
use std::path::PathBuf;

/// Store location when none is configured: the platform data dir, or a
/// workspace-relative fallback when no home directory can be resolved.
pub fn default_store_path() -> PathBuf {
    ProjectDirs::from("", "", "dialogforge")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".dialogforge/store"))
}

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("provider.base_url", "https://api.openai.com/v1")?
        .set_default("provider.default_model", "gpt-3.5-turbo")?
        .set_default("runner.max_attempts", 3)?
        .set_default("runner.backoff_unit_ms", 1000)?
        .set_default("runner.max_concurrent_jobs", 4)?
        .set_default(
            "storage.store_path",
            default_store_path().to_string_lossy().to_string(),
        )
}
