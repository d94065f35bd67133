//! ConfigLoader: the single entry point for building an `AppConfig`.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::AppConfig;
use crate::error::ApiError;
use config::File;
use std::path::Path;

/// Loads layered configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace files,
    /// `DIALOGFORGE__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<AppConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        Self::finish(builder.build()?)
    }

    /// Load configuration from one explicit file (plus defaults and environment).
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);
        Self::finish(builder.build()?)
    }

    fn finish(raw: config::Config) -> Result<AppConfig, ApiError> {
        let mut config: AppConfig = raw.try_deserialize()?;
        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.is_empty());
        }

        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dialogforge.toml");
        std::fs::write(
            &path,
            r#"
[provider]
base_url = "http://localhost:8080/v1"
default_model = "gpt-4"

[runner]
max_attempts = 5
backoff_unit_ms = 10
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.provider.default_model, "gpt-4");
        assert_eq!(config.runner.max_attempts, 5);
        assert_eq!(config.runner.backoff_unit_ms, 10);
        assert_eq!(config.runner.max_concurrent_jobs, 4);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[runner]\nmax_attempts = 0\n").unwrap();

        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ApiError::ConfigError(ref msg) if msg.contains("max_attempts")));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigLoader::load_from_file(&temp_dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ApiError::ConfigError(_)));
    }

    #[test]
    fn test_workspace_file_is_read() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("config")).unwrap();
        std::fs::write(
            temp_dir.path().join("config").join("config.toml"),
            "[storage]\nstore_path = \"data/store\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load(temp_dir.path()).unwrap();
        assert_eq!(config.storage.store_path, std::path::PathBuf::from("data/store"));
    }
}
