//! CLI route: single route table and run context. Dispatches to the control surface and
//! presentation.

use crate::cli::parse::{
    Commands, ConfigCommands, DialogCommands, FeedbackCommands, GeneratorCommands, JobCommands,
};
use crate::cli::presentation::{
    format_dialog, format_dialog_list, format_feedback, format_feedback_list, format_generator,
    format_generator_created, format_generator_list, format_job, format_job_list,
    format_run_report,
};
use crate::config::{AppConfig, ConfigLoader};
use crate::control::{DialogEdit, JobControl};
use crate::dialog::{DialogQuery, ReviewStatus};
use crate::error::{ApiError, StorageError};
use crate::generation::{JobRunner, RetryPolicy, TokioDispatcher};
use crate::generator::NewGenerator;
use crate::job::{JobCommand, JobFilter, NewJob};
use crate::provider::{ModelProviderClient, OpenAIClient};
use crate::store::SledGenerationStore;
use crate::types::JobId;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Runtime context for CLI execution: configuration, store, and control surface.
pub struct RunContext {
    config: AppConfig,
    store_path: PathBuf,
    dispatcher: Arc<TokioDispatcher>,
    control: JobControl,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        let client: Arc<dyn ModelProviderClient> = Arc::new(OpenAIClient::new(&config.provider)?);
        Self::with_client(config, &workspace_root, client)
    }

    /// Create run context around an explicit provider client.
    pub fn with_client(
        config: AppConfig,
        workspace_root: &std::path::Path,
        client: Arc<dyn ModelProviderClient>,
    ) -> Result<Self, ApiError> {
        let store_path = config.storage.resolve_store_path(workspace_root);
        std::fs::create_dir_all(&store_path)
            .map_err(|e| ApiError::StorageError(StorageError::IoError(e)))?;
        let store = Arc::new(SledGenerationStore::new(&store_path)?);

        let runner = JobRunner::new(
            store.clone(),
            client,
            RetryPolicy::from_config(&config.runner),
        );
        let dispatcher = Arc::new(TokioDispatcher::new(
            runner,
            config.runner.max_concurrent_jobs,
        ));
        let control = JobControl::new(store, dispatcher.clone());
        info!(store = %store_path.display(), "Run context ready");

        Ok(Self {
            config,
            store_path,
            dispatcher,
            control,
        })
    }

    /// The control surface behind this context.
    pub fn control(&self) -> &JobControl {
        &self.control
    }

    pub fn store_path(&self) -> &std::path::Path {
        &self.store_path
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands, format: &str) -> Result<String, ApiError> {
        match command {
            Commands::Generator { command } => self.handle_generator_command(command, format),
            Commands::Job { command } => self.handle_job_command(command, format).await,
            Commands::Dialog { command } => self.handle_dialog_command(command, format),
            Commands::Feedback { command } => self.handle_feedback_command(command, format),
            Commands::Config { command } => self.handle_config_command(command, format),
        }
    }

    fn handle_generator_command(
        &self,
        command: &GeneratorCommands,
        format: &str,
    ) -> Result<String, ApiError> {
        match command {
            GeneratorCommands::Add {
                project,
                name,
                templates,
            } => {
                let (generator, warnings) = self.control.create_generator(NewGenerator {
                    project_id: *project,
                    name: name.clone(),
                    templates: templates.clone(),
                })?;
                format_generator_created(&generator, &warnings, format)
            }
            GeneratorCommands::Show { id } => format_generator(&self.control.generator(*id)?, format),
            GeneratorCommands::List { project } => {
                format_generator_list(&self.control.list_generators(*project)?, format)
            }
        }
    }

    async fn handle_job_command(
        &self,
        command: &JobCommands,
        format: &str,
    ) -> Result<String, ApiError> {
        match command {
            JobCommands::Create {
                project,
                generator,
                count,
                model,
                temperature,
                name,
                vars,
            } => {
                let job = self.control.create_job(NewJob {
                    project_id: *project,
                    generator_id: *generator,
                    name: name.clone(),
                    model_name: model
                        .clone()
                        .unwrap_or_else(|| self.config.provider.default_model.clone()),
                    temperature: temperature.unwrap_or(self.config.provider.default_temperature),
                    total_count: *count,
                    variables: parse_vars(vars)?,
                })?;
                format_job(&job, format)
            }
            JobCommands::Start { id } => self.run_foreground(*id, JobCommand::Start, format).await,
            JobCommands::Retry { id } => self.run_foreground(*id, JobCommand::Retry, format).await,
            JobCommands::Stop { id } => format_job(&self.control.stop(*id)?, format),
            JobCommands::List { project, filter } => {
                let filter: JobFilter = filter.parse().map_err(ApiError::InvalidArgument)?;
                format_job_list(&self.control.list_jobs(*project, filter)?, format)
            }
            JobCommands::Show { id } => format_job(&self.control.job(*id)?, format),
        }
    }

    /// Dispatch a run and wait for it; Ctrl-C stops the job at the next item boundary.
    async fn run_foreground(
        &self,
        job_id: JobId,
        command: JobCommand,
        format: &str,
    ) -> Result<String, ApiError> {
        let _watch = self.dispatcher.watch(job_id);
        let (_, handle) = match command {
            JobCommand::Retry => self.control.retry(job_id)?,
            _ => self.control.start(job_id)?,
        };

        let wait = self.dispatcher.wait(&handle);
        tokio::pin!(wait);
        let report = tokio::select! {
            report = &mut wait => report,
            _ = tokio::signal::ctrl_c() => {
                warn!(job_id, "Interrupted; stopping job after the item in flight");
                if let Err(e) = self.control.stop(job_id) {
                    warn!(job_id, error = %e, "Stop after interrupt failed");
                }
                wait.await
            }
        };

        let job = self.control.job(job_id)?;
        format_run_report(&job, report.as_ref(), format)
    }

    fn handle_dialog_command(
        &self,
        command: &DialogCommands,
        format: &str,
    ) -> Result<String, ApiError> {
        match command {
            DialogCommands::List {
                job,
                project,
                status,
            } => {
                let query = match (job, project) {
                    (Some(job_id), _) => DialogQuery::Job(*job_id),
                    (None, Some(project_id)) => DialogQuery::Project(*project_id),
                    (None, None) => {
                        return Err(ApiError::InvalidArgument(
                            "either --job or --project is required".to_string(),
                        ))
                    }
                };
                let status = status
                    .as_deref()
                    .map(str::parse::<ReviewStatus>)
                    .transpose()
                    .map_err(ApiError::InvalidArgument)?;
                format_dialog_list(&self.control.list_dialogs(query, status)?, format)
            }
            DialogCommands::Edit { id, content, field } => {
                let edit = match field {
                    Some(field) => DialogEdit::Attr {
                        field: field.clone(),
                        value: parse_value(content),
                    },
                    None => DialogEdit::Content(content.clone()),
                };
                format_dialog(&self.control.edit_dialog(*id, edit)?, format)
            }
            DialogCommands::Status { id, status } => {
                let status: ReviewStatus = status.parse().map_err(ApiError::InvalidArgument)?;
                format_dialog(&self.control.set_dialog_status(*id, status)?, format)
            }
        }
    }

    fn handle_feedback_command(
        &self,
        command: &FeedbackCommands,
        format: &str,
    ) -> Result<String, ApiError> {
        match command {
            FeedbackCommands::Add {
                dialog,
                user,
                comment,
                content,
            } => {
                let content = match content {
                    Some(raw) => serde_json::from_str(raw).map_err(|e| {
                        ApiError::InvalidArgument(format!("feedback content is not JSON: {}", e))
                    })?,
                    None => serde_json::Value::Null,
                };
                let feedback = self
                    .control
                    .add_feedback(*dialog, *user, comment.clone(), content)?;
                format_feedback(&feedback, format)
            }
            FeedbackCommands::List { dialog } => {
                format_feedback_list(&self.control.list_feedback(*dialog)?, format)
            }
        }
    }

    fn handle_config_command(
        &self,
        command: &ConfigCommands,
        format: &str,
    ) -> Result<String, ApiError> {
        match command {
            ConfigCommands::Show => {
                let shown = self.config.redacted();
                if format == "json" {
                    crate::cli::presentation::to_json(&shown)
                } else {
                    toml::to_string_pretty(&shown).map_err(|e| {
                        ApiError::ConfigError(format!("Failed to render config: {}", e))
                    })
                }
            }
        }
    }
}

/// JSON when it parses, plain string otherwise
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// `key=value` pairs from `--var`
fn parse_vars(vars: &[String]) -> Result<BTreeMap<String, serde_json::Value>, ApiError> {
    vars.iter()
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ApiError::InvalidArgument(format!("variable '{}' is not key=value", pair))
            })?;
            if key.trim().is_empty() {
                return Err(ApiError::InvalidArgument(format!(
                    "variable '{}' has an empty key",
                    pair
                )));
            }
            Ok((key.trim().to_string(), parse_value(value)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&[
            "tone=\"warm\"".to_string(),
            "turns=4".to_string(),
            "topic=weather".to_string(),
        ])
        .unwrap();
        assert_eq!(vars["tone"], json!("warm"));
        assert_eq!(vars["turns"], json!(4));
        assert_eq!(vars["topic"], json!("weather"));

        assert!(parse_vars(&["novalue".to_string()]).is_err());
        assert!(parse_vars(&["=x".to_string()]).is_err());
    }
}
