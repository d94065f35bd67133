//! Integration tests for the CLI route table, driven without a terminal.

use super::test_utils::ScriptedClient;
use dialogforge::cli::{
    Commands, ConfigCommands, DialogCommands, FeedbackCommands, GeneratorCommands, JobCommands,
    RunContext,
};
use dialogforge::config::AppConfig;
use dialogforge::error::ApiError;
use std::sync::Arc;
use tempfile::TempDir;

fn context(workspace: &TempDir) -> RunContext {
    let mut config = AppConfig::default();
    config.storage.store_path = "store".into();
    config.provider.api_key = Some("sk-test-secret".to_string());
    config.runner.backoff_unit_ms = 1;
    RunContext::with_client(
        config,
        workspace.path(),
        Arc::new(ScriptedClient::new(vec![])),
    )
    .unwrap()
}

fn json(output: &str) -> serde_json::Value {
    serde_json::from_str(output).unwrap()
}

#[tokio::test]
async fn test_generator_job_dialog_round() {
    let workspace = TempDir::new().unwrap();
    let ctx = context(&workspace);

    let created = ctx
        .execute(
            &Commands::Generator {
                command: GeneratorCommands::Add {
                    project: 1,
                    name: "smalltalk".to_string(),
                    templates: vec!["Pick a topic".to_string(), "Write about ^^".to_string()],
                },
            },
            "json",
        )
        .await
        .unwrap();
    let generator_id = json(&created)["generator"]["id"].as_u64().unwrap();

    let job = ctx
        .execute(
            &Commands::Job {
                command: JobCommands::Create {
                    project: 1,
                    generator: generator_id,
                    count: 2,
                    model: None,
                    temperature: Some(0.3),
                    name: Some("weekend".to_string()),
                    vars: vec!["persona=\"pirate\"".to_string()],
                },
            },
            "json",
        )
        .await
        .unwrap();
    let job = json(&job);
    let job_id = job["job"]["id"].as_u64().unwrap();
    assert_eq!(job["job"]["status"], "Waiting");
    assert_eq!(job["job"]["model_name"], "gpt-3.5-turbo");
    assert_eq!(job["job"]["variables"]["persona"], "pirate");

    let run = ctx
        .execute(
            &Commands::Job {
                command: JobCommands::Start { id: job_id },
            },
            "json",
        )
        .await
        .unwrap();
    let run = json(&run);
    assert_eq!(run["run"]["final_status"], "Finished");
    assert_eq!(run["job"]["generated_count"], 2);

    let dialogs = ctx
        .execute(
            &Commands::Dialog {
                command: DialogCommands::List {
                    job: Some(job_id),
                    project: None,
                    status: Some("candidate".to_string()),
                },
            },
            "json",
        )
        .await
        .unwrap();
    let dialogs = json(&dialogs);
    assert_eq!(dialogs.as_array().unwrap().len(), 2);
    let dialog_id = dialogs[0]["id"].as_u64().unwrap();

    let edited = ctx
        .execute(
            &Commands::Dialog {
                command: DialogCommands::Edit {
                    id: dialog_id,
                    content: "Ahoy".to_string(),
                    field: None,
                },
            },
            "json",
        )
        .await
        .unwrap();
    assert_eq!(json(&edited)["edited"], true);

    ctx.execute(
        &Commands::Feedback {
            command: FeedbackCommands::Add {
                dialog: dialog_id,
                user: 7,
                comment: "good".to_string(),
                content: Some("{\"score\": 4}".to_string()),
            },
        },
        "json",
    )
    .await
    .unwrap();
    let feedback = ctx
        .execute(
            &Commands::Feedback {
                command: FeedbackCommands::List { dialog: dialog_id },
            },
            "json",
        )
        .await
        .unwrap();
    assert_eq!(json(&feedback)[0]["content"]["score"], 4);
}

#[tokio::test]
async fn test_bad_arguments_are_reported() {
    let workspace = TempDir::new().unwrap();
    let ctx = context(&workspace);

    let err = ctx
        .execute(
            &Commands::Job {
                command: JobCommands::List {
                    project: 1,
                    filter: "pending".to_string(),
                },
            },
            "text",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidArgument(_)));

    let err = ctx
        .execute(
            &Commands::Job {
                command: JobCommands::Start { id: 404 },
            },
            "text",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::JobNotFound(404)));
}

#[tokio::test]
async fn test_config_show_redacts_secrets() {
    let workspace = TempDir::new().unwrap();
    let ctx = context(&workspace);
    let shown = ctx
        .execute(
            &Commands::Config {
                command: ConfigCommands::Show,
            },
            "text",
        )
        .await
        .unwrap();
    assert!(!shown.contains("sk-test-secret"));
    assert!(shown.contains("[runner]"));
}
