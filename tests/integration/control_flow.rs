//! Integration tests for the job control surface driving real dispatched runs.

use super::test_utils::{ScriptedClient, TestStore};
use dialogforge::control::JobControl;
use dialogforge::error::{ApiError, ProviderError};
use dialogforge::generation::{JobRunner, RetryPolicy, TokioDispatcher};
use dialogforge::job::{JobFilter, JobStatus};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    env: TestStore,
    dispatcher: Arc<TokioDispatcher>,
    control: JobControl,
}

fn harness(client: ScriptedClient) -> Harness {
    let env = TestStore::new(&["Write a short dialog"]);
    let runner = JobRunner::new(
        env.store.clone(),
        Arc::new(client),
        RetryPolicy::new(3, Duration::from_secs(1)),
    );
    let dispatcher = Arc::new(TokioDispatcher::new(runner, 4));
    let control = JobControl::new(env.store.clone(), dispatcher.clone());
    Harness {
        env,
        dispatcher,
        control,
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_runs_job_to_completion() {
    let h = harness(ScriptedClient::new(vec![]));
    let job = h.control.create_job(h.env.job_request(3)).unwrap();
    assert_eq!(job.status, JobStatus::Waiting);

    let (running, handle) = h.control.start(job.id).unwrap();
    assert_eq!(running.status, JobStatus::Running);

    let report = h.dispatcher.wait(&handle).await.unwrap();
    assert_eq!(report.final_status, JobStatus::Finished);
    assert_eq!(report.dialogs_created, 3);

    let progress = h.control.progress(job.id).unwrap();
    assert_eq!(progress.status, JobStatus::Finished);
    assert_eq!(progress.progress, 1.0);
    assert!(h
        .control
        .list_jobs(1, JobFilter::Unfinished)
        .unwrap()
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_running_job_keeps_in_flight_item() {
    let h = harness(ScriptedClient::new(vec![]).with_delay(Duration::from_secs(10)));
    let job = h.control.create_job(h.env.job_request(3)).unwrap();
    let (_, handle) = h.control.start(job.id).unwrap();

    // second start while the first run is live
    assert!(matches!(
        h.control.start(job.id),
        Err(ApiError::AlreadyRunning { .. })
    ));

    // let the run get into its first API call
    tokio::time::sleep(Duration::from_secs(1)).await;
    let stopped = h.control.stop(job.id).unwrap();
    assert_eq!(stopped.status, JobStatus::Stopped);

    let report = h.dispatcher.wait(&handle).await.unwrap();
    assert_eq!(report.final_status, JobStatus::Stopped);
    assert_eq!(report.dialogs_created, 1);

    let job = h.env.job(job.id);
    assert_eq!(job.status, JobStatus::Stopped);
    assert_eq!(job.generated_count, 1);
    assert_eq!(job.duration(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start_means_the_run_never_happens() {
    let h = harness(ScriptedClient::new(vec![]));
    let job = h.control.create_job(h.env.job_request(2)).unwrap();
    let (_, handle) = h.control.start(job.id).unwrap();
    h.control.stop(job.id).unwrap();

    assert!(h.dispatcher.wait(&handle).await.is_none());
    let job = h.env.job(job.id);
    assert_eq!(job.status, JobStatus::Stopped);
    assert_eq!(job.generated_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_only_resumes_through_retry() {
    let h = harness(ScriptedClient::new(vec![Err(ProviderError::Authentication(
        "expired key".to_string(),
    ))]));
    let job = h.control.create_job(h.env.job_request(2)).unwrap();
    let (_, handle) = h.control.start(job.id).unwrap();
    let report = h.dispatcher.wait(&handle).await.unwrap();
    assert_eq!(report.final_status, JobStatus::Error);

    assert!(matches!(
        h.control.start(job.id),
        Err(ApiError::InvalidTransition {
            status: JobStatus::Error,
            ..
        })
    ));

    let (_, handle) = h.control.retry(job.id).unwrap();
    let report = h.dispatcher.wait(&handle).await.unwrap();
    assert_eq!(report.final_status, JobStatus::Finished);
    assert_eq!(h.env.job(job.id).generated_count, 2);

    assert!(matches!(
        h.control.retry(job.id),
        Err(ApiError::InvalidTransition {
            status: JobStatus::Finished,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_stop_resumes_counts() {
    let h = harness(ScriptedClient::new(vec![]).with_delay(Duration::from_secs(2)));
    let job = h.control.create_job(h.env.job_request(4)).unwrap();
    let _watch = h.dispatcher.watch(job.id);
    let (_, handle) = h.control.start(job.id).unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    h.control.stop(job.id).unwrap();
    h.dispatcher.wait(&handle).await;
    let stopped_at = h.env.job(job.id).generated_count;
    assert_eq!(stopped_at, 2);

    let (_, handle) = h.control.retry(job.id).unwrap();
    let report = h.dispatcher.wait(&handle).await.unwrap();
    assert_eq!(report.dialogs_created, 4 - stopped_at);
    assert_eq!(h.env.job(job.id).generated_count, 4);
}

#[tokio::test(start_paused = true)]
async fn test_retry_while_stopped_run_drains_does_not_lose_the_retry() {
    let h = harness(ScriptedClient::new(vec![]).with_delay(Duration::from_secs(10)));
    let job = h.control.create_job(h.env.job_request(3)).unwrap();
    let _watch = h.dispatcher.watch(job.id);
    let (_, first) = h.control.start(job.id).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    h.control.stop(job.id).unwrap();
    // retried while the first run's item is still in flight
    let (_, second) = h.control.retry(job.id).unwrap();

    let stale = h.dispatcher.wait(&first).await.unwrap();
    assert_eq!(stale.dialogs_created, 1);
    assert_eq!(h.env.job(job.id).status, JobStatus::Running);

    let report = h.dispatcher.wait(&second).await.unwrap();
    assert_eq!(report.final_status, JobStatus::Finished);
    assert_eq!(report.dialogs_created, 2);

    let job = h.env.job(job.id);
    assert_eq!(job.status, JobStatus::Finished);
    assert_eq!(job.generated_count, 3);
    assert_eq!(job.duration(), Duration::from_secs(30));
}
