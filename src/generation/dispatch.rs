//! Task dispatch: schedules runner executions and cancels them.
//!
//! The tokio dispatcher runs each submitted job as its own task. A semaphore bounds how
//! many jobs run at once, and a per-job lock keeps two executions of the same job from
//! overlapping when a stale run is still finishing its in-flight item. A task drops its
//! bookkeeping when it ends unless a waiter or a watch still wants its report.

use crate::error::ApiError;
use crate::generation::runner::{CancelSignal, JobRunner, RunReport};
use crate::types::JobId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

/// Opaque identifier of one dispatched execution
pub type TaskHandle = String;

/// Capability to schedule and cancel runner executions.
///
/// Scheduling is two steps so the caller can persist the handle on the job before the
/// execution can start: a run only acts on a job whose stored handle is its own.
pub trait TaskDispatcher: Send + Sync {
    /// Allocate the handle the next execution of `job_id` will run under.
    fn reserve(&self, job_id: JobId) -> TaskHandle;

    /// Schedule one asynchronous run of `job_id` under a reserved handle.
    fn submit(&self, job_id: JobId, handle: &str) -> Result<(), ApiError>;

    /// Best-effort cancellation. Returns `false` when the handle is unknown or its
    /// execution already ended.
    fn cancel(&self, handle: &str) -> bool;
}

struct TaskEntry {
    job_id: JobId,
    cancel: CancelSignal,
    started: Arc<AtomicBool>,
    abort: AbortHandle,
    /// Taken by whoever waits on the execution
    join: Option<JoinHandle<Option<RunReport>>>,
}

type JobLock = Arc<tokio::sync::Mutex<()>>;

/// Bookkeeping shared between the dispatcher and its tasks
#[derive(Default)]
struct Registry {
    tasks: Mutex<HashMap<TaskHandle, TaskEntry>>,
    job_locks: Mutex<HashMap<JobId, JobLock>>,
    watched: Mutex<HashMap<JobId, usize>>,
}

impl Registry {
    fn job_lock(&self, job_id: JobId) -> JobLock {
        self.job_locks
            .lock()
            .entry(job_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn is_watched(&self, job_id: JobId) -> bool {
        self.watched.lock().contains_key(&job_id)
    }

    /// Forget an ended execution nobody is going to wait on.
    fn finish(&self, handle: &str, job_id: JobId, lock: &JobLock) {
        if !self.is_watched(job_id) {
            let mut tasks = self.tasks.lock();
            if tasks.get(handle).is_some_and(|entry| entry.join.is_some()) {
                tasks.remove(handle);
            }
        }

        let mut locks = self.job_locks.lock();
        // the map's copy and ours; anyone else is queued on the lock
        if Arc::strong_count(lock) <= 2 {
            locks.remove(&job_id);
        }
    }

    fn unwatch(&self, job_id: JobId) {
        let mut watched = self.watched.lock();
        let Some(count) = watched.get_mut(&job_id) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        watched.remove(&job_id);
        drop(watched);

        // ended executions kept for a waiter that never came
        self.tasks.lock().retain(|_, entry| {
            entry.job_id != job_id || entry.join.is_none() || !entry.abort.is_finished()
        });
    }
}

/// Runs when a task ends or is aborted, including before its first poll
struct TaskCleanup {
    registry: Arc<Registry>,
    handle: TaskHandle,
    job_id: JobId,
    lock: JobLock,
}

impl Drop for TaskCleanup {
    fn drop(&mut self) {
        self.registry.finish(&self.handle, self.job_id, &self.lock);
    }
}

/// Keeps the reports of a job's executions for `wait` while held
pub struct Watch {
    registry: Arc<Registry>,
    job_id: JobId,
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.registry.unwatch(self.job_id);
    }
}

/// Single-process dispatcher backed by tokio tasks
pub struct TokioDispatcher {
    runner: JobRunner,
    permits: Arc<Semaphore>,
    registry: Arc<Registry>,
    next_task: AtomicU64,
}

impl TokioDispatcher {
    pub fn new(runner: JobRunner, max_concurrent_jobs: usize) -> Self {
        Self {
            runner,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            registry: Arc::new(Registry::default()),
            next_task: AtomicU64::new(1),
        }
    }

    /// Keep reports of `job_id`'s executions until the watch is dropped.
    ///
    /// Take it before starting a job whose run you intend to `wait` on; without it a
    /// run that ends first forgets its report.
    pub fn watch(&self, job_id: JobId) -> Watch {
        *self.registry.watched.lock().entry(job_id).or_insert(0) += 1;
        Watch {
            registry: Arc::clone(&self.registry),
            job_id,
        }
    }

    /// Wait for a dispatched execution to end and return its report.
    ///
    /// The handle stays cancellable while waiting. `None` when the handle is unknown
    /// or already waited on, the task was aborted before starting, or the run had
    /// nothing to do.
    pub async fn wait(&self, handle: &str) -> Option<RunReport> {
        let join = self.registry.tasks.lock().get_mut(handle)?.join.take()?;
        let result = join.await;
        let entry = self.registry.tasks.lock().remove(handle);
        match result {
            Ok(report) => report,
            Err(err) => {
                debug!(
                    handle,
                    job_id = ?entry.map(|e| e.job_id),
                    error = %err,
                    "Task did not complete"
                );
                None
            }
        }
    }
}

impl TaskDispatcher for TokioDispatcher {
    fn reserve(&self, job_id: JobId) -> TaskHandle {
        format!(
            "task-{}-{}",
            job_id,
            self.next_task.fetch_add(1, Ordering::SeqCst)
        )
    }

    fn submit(&self, job_id: JobId, handle: &str) -> Result<(), ApiError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ApiError::DispatchFailed(format!("no async runtime: {}", e)))?;

        let cancel = CancelSignal::new();
        let started = Arc::new(AtomicBool::new(false));
        let cleanup = TaskCleanup {
            registry: Arc::clone(&self.registry),
            handle: handle.to_string(),
            job_id,
            lock: self.registry.job_lock(job_id),
        };

        let runner = self.runner.clone();
        let permits = Arc::clone(&self.permits);
        let task_cancel = cancel.clone();
        let task_started = Arc::clone(&started);

        let join = runtime.spawn(async move {
            let cleanup = cleanup;
            let _permit = permits.acquire_owned().await.ok()?;
            let _exclusive = Arc::clone(&cleanup.lock).lock_owned().await;
            task_started.store(true, Ordering::SeqCst);
            debug!(handle = %cleanup.handle, job_id, "Task started");
            let report = runner
                .run_dispatched(job_id, &cleanup.handle, &task_cancel)
                .await;
            report
        });
        let abort = join.abort_handle();
        self.registry.tasks.lock().insert(
            handle.to_string(),
            TaskEntry {
                job_id,
                cancel,
                started,
                abort: abort.clone(),
                join: Some(join),
            },
        );
        // a task that ended before its entry existed had nothing to clean up
        if abort.is_finished() && !self.registry.is_watched(job_id) {
            self.registry.tasks.lock().remove(handle);
        }

        info!(handle, job_id, "Generation task submitted");
        Ok(())
    }

    fn cancel(&self, handle: &str) -> bool {
        let (job_id, started, abort) = {
            let tasks = self.registry.tasks.lock();
            let Some(entry) = tasks.get(handle) else {
                return false;
            };
            if entry.abort.is_finished() {
                return false;
            }
            entry.cancel.cancel();
            (
                entry.job_id,
                entry.started.load(Ordering::SeqCst),
                entry.abort.clone(),
            )
        };

        if !started {
            // still queued behind a permit or the job lock
            abort.abort();
            info!(handle, job_id, "Queued generation task aborted");
        } else {
            info!(
                handle,
                job_id, "Cancellation requested for running generation task"
            );
        }
        true
    }
}
