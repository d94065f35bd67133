//! Property-based tests for the job counter invariant

use super::test_utils::{transient, ScriptedClient, TestStore};
use dialogforge::dialog::DialogQuery;
use dialogforge::error::ProviderError;
use dialogforge::generation::{CancelSignal, JobRunner, RetryPolicy};
use dialogforge::job::JobStatus;
use dialogforge::store::GenerationStore;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Step {
    Ok,
    Transient,
    Fatal,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => Just(Step::Ok),
        2 => Just(Step::Transient),
        1 => Just(Step::Fatal),
    ]
}

fn script(steps: &[Step]) -> Vec<Result<String, ProviderError>> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| match step {
            Step::Ok => Ok(format!("dialog {}", i)),
            Step::Transient => Err(transient()),
            Step::Fatal => Err(ProviderError::InvalidRequest("bad prompt".to_string())),
        })
        .collect()
}

/// generated_count never exceeds total_count, whatever the API does and however
/// many times the job is re-run
#[test]
fn test_generated_never_exceeds_total() {
    let config = ProptestConfig::with_cases(24);
    let mut runner = proptest::test_runner::TestRunner::new(config);

    runner
        .run(
            &(
                0u64..6,
                prop::collection::vec(step_strategy(), 0..12),
                1usize..4,
            ),
            |(total, steps, reruns)| {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .start_paused(true)
                    .build()
                    .unwrap();
                let env = TestStore::new(&["Write a dialog"]);
                let job = env.add_job(total);
                let client = Arc::new(ScriptedClient::new(script(&steps)));
                let job_runner = JobRunner::new(
                    env.store.clone(),
                    client,
                    RetryPolicy::new(3, Duration::from_millis(10)),
                );

                for _ in 0..reruns {
                    rt.block_on(job_runner.run(job.id, &CancelSignal::new()));
                    let current = env.job(job.id);
                    prop_assert!(current.generated_count <= current.total_count);
                    let dialogs = env.store.list_dialogs(DialogQuery::Job(job.id)).unwrap();
                    prop_assert_eq!(dialogs.len() as u64, current.generated_count);
                    if current.generated_count == current.total_count {
                        prop_assert_eq!(current.status, JobStatus::Finished);
                    }
                }
                Ok(())
            },
        )
        .unwrap();
}
