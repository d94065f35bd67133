//! Generation job runner.
//!
//! Drives one job from its current `generated_count` up to `total_count`, one chain
//! execution per item. Progress is committed after every item so an interrupted run
//! loses at most the item in flight. The runner never returns an error: every outcome,
//! including storage trouble, ends up in the job's status and duration.

use crate::error::StorageError;
use crate::generation::chain::execute_chain;
use crate::generation::retry::{RetryOutcome, RetryPolicy};
use crate::generator::Generator;
use crate::job::{GenerationJob, JobStatus};
use crate::provider::ModelProviderClient;
use crate::store::GenerationStore;
use crate::types::JobId;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Advisory stop request, checked by the runner between items
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one run segment
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub job_id: JobId,
    pub final_status: JobStatus,
    /// API attempts across all items, retries included
    pub attempts: u32,
    pub dialogs_created: u64,
    /// Elapsed time folded into the job's duration by this run
    pub elapsed: Duration,
}

/// How the item loop ended
enum LoopEnd {
    Completed,
    Cancelled,
    Exhausted,
    Fatal,
}

impl LoopEnd {
    fn status(&self) -> JobStatus {
        match self {
            LoopEnd::Completed => JobStatus::Finished,
            LoopEnd::Cancelled | LoopEnd::Exhausted => JobStatus::Stopped,
            LoopEnd::Fatal => JobStatus::Error,
        }
    }
}

#[derive(Default)]
struct Tally {
    attempts: u32,
    dialogs_created: u64,
}

/// Executes generation jobs against a store and a provider client
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn GenerationStore>,
    client: Arc<dyn ModelProviderClient>,
    policy: RetryPolicy,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        client: Arc<dyn ModelProviderClient>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            client,
            policy,
        }
    }

    /// Run a job until it finishes, stops, fails, or is cancelled.
    ///
    /// Returns `None` when there was nothing to run: the job or its generator is
    /// missing, or cancellation arrived before the run began.
    pub async fn run(&self, job_id: JobId, cancel: &CancelSignal) -> Option<RunReport> {
        self.execute(job_id, None, cancel).await
    }

    /// Run on behalf of the dispatched execution `handle`.
    ///
    /// The run only claims a job that is `Running` with `handle` stored on it, so a stop
    /// that lands before the task starts is kept. Once the job is re-dispatched under
    /// another handle this run still folds its elapsed time but leaves the status alone.
    pub async fn run_dispatched(
        &self,
        job_id: JobId,
        handle: &str,
        cancel: &CancelSignal,
    ) -> Option<RunReport> {
        self.execute(job_id, Some(handle), cancel).await
    }

    async fn execute(
        &self,
        job_id: JobId,
        owner: Option<&str>,
        cancel: &CancelSignal,
    ) -> Option<RunReport> {
        if cancel.is_cancelled() {
            debug!(job_id, "Run cancelled before start");
            return None;
        }

        let started = Instant::now();
        let mut tally = Tally::default();
        match self.try_run(job_id, owner, cancel, started, &mut tally).await {
            Ok(report) => report,
            Err(err) => {
                error!(job_id, error = %err, "Storage failure during generation run");
                let elapsed = started.elapsed();
                if let Err(mark_err) = self.settle(job_id, owner, JobStatus::Error, elapsed) {
                    error!(job_id, error = %mark_err, "Could not mark job as failed");
                }
                Some(RunReport {
                    job_id,
                    final_status: JobStatus::Error,
                    attempts: tally.attempts,
                    dialogs_created: tally.dialogs_created,
                    elapsed,
                })
            }
        }
    }

    async fn try_run(
        &self,
        job_id: JobId,
        owner: Option<&str>,
        cancel: &CancelSignal,
        started: Instant,
        tally: &mut Tally,
    ) -> Result<Option<RunReport>, StorageError> {
        let Some(job) = self.store.get_job(job_id)? else {
            warn!(job_id, "Generation job not found, nothing to run");
            return Ok(None);
        };
        let Some(generator) = self.store.get_generator(job.generator_id)? else {
            warn!(
                job_id,
                generator_id = job.generator_id,
                "Generator not found, nothing to run"
            );
            return Ok(None);
        };

        let mut claimed = false;
        let job = self.store.update_job(job_id, &mut |job: &mut GenerationJob| {
            claimed = owns(job, owner) && (owner.is_none() || job.status == JobStatus::Running);
            if claimed {
                job.status = JobStatus::Running;
            }
        })?;
        if !claimed {
            info!(
                job_id,
                status = %job.status,
                handle = ?owner,
                "Job stopped or re-dispatched before the run began, skipping"
            );
            return Ok(None);
        }

        let items_left = job.items_left();
        info!(
            job_id,
            items_left,
            generated = job.generated_count,
            total = job.total_count,
            steps = generator.steps(),
            "Generation run started"
        );

        let attrs = derived_attrs(&job, &generator);
        let mut end = LoopEnd::Completed;
        for _ in 0..items_left {
            if self.cancellation_observed(job_id, owner, cancel)? {
                end = LoopEnd::Cancelled;
                break;
            }

            let client = self.client.as_ref();
            let templates = generator.templates.as_slice();
            let model = job.model_name.as_str();
            let temperature = job.temperature;
            let outcome = self
                .policy
                .run(move || execute_chain(client, templates, model, temperature))
                .await;
            tally.attempts += outcome.attempts();

            match outcome {
                RetryOutcome::Success { value, attempts } => {
                    let mut item_attrs = attrs.clone();
                    item_attrs.insert("attempts".to_string(), json!(attempts));
                    let (dialog, job) = self.store.record_dialog(job_id, &value, &item_attrs)?;
                    tally.dialogs_created += 1;
                    debug!(
                        job_id,
                        dialog_id = dialog.id,
                        generated = job.generated_count,
                        total = job.total_count,
                        "Item generated"
                    );
                }
                RetryOutcome::Exhausted { error, attempts } => {
                    warn!(job_id, attempts, error = %error, "Item retries exhausted, stopping job");
                    end = LoopEnd::Exhausted;
                    break;
                }
                RetryOutcome::Fatal { error, attempts } => {
                    error!(job_id, attempts, error = %error, "Fatal generation error, failing job");
                    end = LoopEnd::Fatal;
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        let final_status = end.status();
        let job = self.settle(job_id, owner, final_status, elapsed)?;
        info!(
            job_id,
            status = %job.status,
            generated = job.generated_count,
            total = job.total_count,
            duration_ms = job.duration_ms,
            dialogs_created = tally.dialogs_created,
            "Generation run ended"
        );

        Ok(Some(RunReport {
            job_id,
            final_status,
            attempts: tally.attempts,
            dialogs_created: tally.dialogs_created,
            elapsed,
        }))
    }

    /// Signal set, someone moved the persisted status off Running, or the job now
    /// belongs to a newer execution.
    fn cancellation_observed(
        &self,
        job_id: JobId,
        owner: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<bool, StorageError> {
        if cancel.is_cancelled() {
            info!(job_id, "Cancellation requested, stopping at item boundary");
            return Ok(true);
        }
        let job = self
            .store
            .get_job(job_id)?
            .ok_or(StorageError::JobNotFound(job_id))?;
        if job.status != JobStatus::Running {
            info!(job_id, status = %job.status, "Job status changed externally, stopping");
            return Ok(true);
        }
        if !owns(&job, owner) {
            info!(job_id, handle = ?owner, "Job re-dispatched elsewhere, stopping");
            return Ok(true);
        }
        Ok(false)
    }

    fn settle(
        &self,
        job_id: JobId,
        owner: Option<&str>,
        status: JobStatus,
        elapsed: Duration,
    ) -> Result<GenerationJob, StorageError> {
        debug_assert!(status.is_settled());
        self.store.update_job(job_id, &mut |job: &mut GenerationJob| {
            if owns(job, owner) {
                job.status = status;
            }
            job.fold_duration(elapsed);
        })
    }
}

/// An unowned run may always act; a dispatched one only under its own handle.
fn owns(job: &GenerationJob, owner: Option<&str>) -> bool {
    owner.map_or(true, |handle| job.task_handle.as_deref() == Some(handle))
}

/// Attributes stamped on every dialog a run produces.
fn derived_attrs(job: &GenerationJob, generator: &Generator) -> BTreeMap<String, serde_json::Value> {
    let mut attrs = BTreeMap::new();
    attrs.insert("model".to_string(), json!(job.model_name));
    attrs.insert("temperature".to_string(), json!(job.temperature));
    attrs.insert("steps".to_string(), json!(generator.steps()));
    attrs.insert("generator".to_string(), json!(generator.name));
    attrs
}
