//! Integration tests for the generation job runner: retries, resume, and duration.

use super::test_utils::{transient, ScriptedClient, TestStore};
use dialogforge::dialog::{DialogQuery, ReviewStatus, SourceType};
use dialogforge::error::ProviderError;
use dialogforge::generation::{CancelSignal, JobRunner, RetryPolicy};
use dialogforge::job::JobStatus;
use dialogforge::store::GenerationStore;
use std::sync::Arc;
use std::time::Duration;

fn runner(env: &TestStore, client: Arc<ScriptedClient>) -> JobRunner {
    JobRunner::new(
        env.store.clone(),
        client,
        RetryPolicy::new(3, Duration::from_secs(1)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_two_transient_errors_then_success() {
    let env = TestStore::new(&["Write a greeting"]);
    let job = env.add_job(1);
    let client = Arc::new(ScriptedClient::new(vec![
        Err(transient()),
        Err(ProviderError::Timeout("slow".to_string())),
        Ok("Hello!".to_string()),
    ]));

    let report = runner(&env, client.clone())
        .run(job.id, &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(report.final_status, JobStatus::Finished);
    assert_eq!(report.attempts, 3);
    assert_eq!(client.calls(), 3);

    let job = env.job(job.id);
    assert_eq!(job.generated_count, 1);
    let dialogs = env.store.list_dialogs(DialogQuery::Job(job.id)).unwrap();
    assert_eq!(dialogs.len(), 1);
    let dialog = &dialogs[0];
    assert_eq!(dialog.content, "Hello!");
    assert_eq!(dialog.source_type, SourceType::Generator);
    assert_eq!(dialog.source_id, Some(env.generator.id));
    assert_eq!(dialog.status, ReviewStatus::Candidate);
    assert!(!dialog.edited);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_stop_the_job() {
    let env = TestStore::new(&["Write a greeting"]);
    let job = env.add_job(2);
    let client = Arc::new(ScriptedClient::new(vec![
        Err(transient()),
        Err(transient()),
        Err(transient()),
    ]));

    let report = runner(&env, client.clone())
        .run(job.id, &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(report.final_status, JobStatus::Stopped);
    assert_eq!(client.calls(), 3);
    let job = env.job(job.id);
    assert_eq!(job.status, JobStatus::Stopped);
    assert_eq!(job.generated_count, 0);
    assert!(env
        .store
        .list_dialogs(DialogQuery::Job(job.id))
        .unwrap()
        .is_empty());
    // backoff of 1s + 2s, nothing after the last attempt
    assert_eq!(job.duration(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_fails_immediately() {
    let env = TestStore::new(&["Write a greeting"]);
    let job = env.add_job(4);
    let client = Arc::new(ScriptedClient::new(vec![Err(ProviderError::RateLimit(
        "quota".to_string(),
    ))]));

    let report = runner(&env, client.clone())
        .run(job.id, &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(report.final_status, JobStatus::Error);
    assert_eq!(client.calls(), 1);
    let job = env.job(job.id);
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.generated_count, 0);
    assert_eq!(job.duration(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_resume_runs_only_remaining_items() {
    let env = TestStore::new(&["Write a greeting"]);
    let job = env.add_job(5);

    let first_client = Arc::new(ScriptedClient::new(vec![]));
    let cancel = CancelSignal::new();
    first_client.cancel_after(2, cancel.clone());
    let first = runner(&env, first_client.clone()).run(job.id, &cancel).await.unwrap();

    assert_eq!(first.final_status, JobStatus::Stopped);
    assert_eq!(first_client.calls(), 2);
    assert_eq!(env.job(job.id).generated_count, 2);

    let second_client = Arc::new(ScriptedClient::new(vec![]));
    let second = runner(&env, second_client.clone())
        .run(job.id, &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(second.final_status, JobStatus::Finished);
    assert_eq!(second_client.calls(), 3);
    let job = env.job(job.id);
    assert_eq!(job.generated_count, 5);
    assert_eq!(
        env.store.list_dialogs(DialogQuery::Job(job.id)).unwrap().len(),
        5
    );
}

#[tokio::test(start_paused = true)]
async fn test_duration_accumulates_across_segments() {
    let env = TestStore::new(&["Write a greeting"]);
    let job = env.add_job(2);

    let first_client = Arc::new(ScriptedClient::new(vec![]).with_delay(Duration::from_secs(5)));
    let cancel = CancelSignal::new();
    first_client.cancel_after(1, cancel.clone());
    runner(&env, first_client).run(job.id, &cancel).await.unwrap();
    assert_eq!(env.job(job.id).duration(), Duration::from_secs(5));

    let second_client = Arc::new(ScriptedClient::new(vec![]).with_delay(Duration::from_secs(3)));
    let report = runner(&env, second_client)
        .run(job.id, &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(report.elapsed, Duration::from_secs(3));
    let job = env.job(job.id);
    assert_eq!(job.status, JobStatus::Finished);
    assert_eq!(job.duration(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_chain_output_feeds_next_step() {
    let env = TestStore::new(&["A", "do ^^ more"]);
    let job = env.add_job(1);
    let client = Arc::new(ScriptedClient::new(vec![
        Ok("first".to_string()),
        Ok("second".to_string()),
    ]));

    runner(&env, client.clone())
        .run(job.id, &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(client.prompts(), vec!["A".to_string(), "do first more".to_string()]);
    let dialogs = env.store.list_dialogs(DialogQuery::Job(job.id)).unwrap();
    assert_eq!(dialogs[0].content, "second");
}

#[tokio::test(start_paused = true)]
async fn test_missing_generator_is_a_no_op() {
    let env = TestStore::new(&["A"]);
    let mut request = env.job_request(3);
    request.generator_id = 9_999;
    let job = env.store.insert_job(request).unwrap();
    let client = Arc::new(ScriptedClient::new(vec![]));

    let report = runner(&env, client.clone())
        .run(job.id, &CancelSignal::new())
        .await;

    assert!(report.is_none());
    assert_eq!(client.calls(), 0);
    assert_eq!(env.job(job.id).status, JobStatus::Waiting);
}
