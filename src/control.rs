//! Job Control Surface
//!
//! The operations a CRUD layer or the CLI performs against jobs: create, start, stop,
//! retry, and read progress. Also the dialog and feedback bookkeeping that reviewing
//! generated output needs. Status changes go through `JobStatus::apply`, so a command
//! that is not allowed in the current status is refused before anything is dispatched.

use crate::dialog::{Dialog, DialogQuery, Feedback, ReviewStatus};
use crate::error::{ApiError, StorageError};
use crate::generation::dispatch::{TaskDispatcher, TaskHandle};
use crate::generator::{Generator, NewGenerator};
use crate::job::{GenerationJob, JobCommand, JobFilter, JobStatus, NewJob, Rejection};
use crate::store::GenerationStore;
use crate::types::{DialogId, GeneratorId, JobId, ProjectId, UserId};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Read-side view of a job's progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    pub generated_count: u64,
    pub total_count: u64,
    /// `generated / total`, 0 for an empty target
    pub progress: f64,
    pub duration_ms: u64,
}

impl JobProgress {
    pub fn of(job: &GenerationJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            generated_count: job.generated_count,
            total_count: job.total_count,
            progress: job.progress(),
            duration_ms: job.duration_ms,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// A reviewer's change to a dialog
#[derive(Debug, Clone)]
pub enum DialogEdit {
    /// Replace the generated text
    Content(String),
    /// Replace the value of an existing attribute
    Attr {
        field: String,
        value: serde_json::Value,
    },
}

/// Job control surface
pub struct JobControl {
    store: Arc<dyn GenerationStore>,
    dispatcher: Arc<dyn TaskDispatcher>,
}

impl JobControl {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        dispatcher: Arc<dyn TaskDispatcher>,
    ) -> Self {
        Self { store, dispatcher }
    }

    // Generators

    /// Create a generator; returns it together with validation warnings.
    pub fn create_generator(
        &self,
        request: NewGenerator,
    ) -> Result<(Generator, Vec<String>), ApiError> {
        let warnings = request.validate().map_err(ApiError::InvalidGenerator)?;
        for warning in &warnings {
            warn!(generator = %request.name, "{}", warning);
        }
        let generator = self.store.insert_generator(request)?;
        info!(
            generator_id = generator.id,
            steps = generator.steps(),
            "Generator created"
        );
        Ok((generator, warnings))
    }

    pub fn generator(&self, id: GeneratorId) -> Result<Generator, ApiError> {
        self.store
            .get_generator(id)?
            .ok_or(ApiError::GeneratorNotFound(id))
    }

    pub fn list_generators(&self, project_id: ProjectId) -> Result<Vec<Generator>, ApiError> {
        Ok(self.store.list_generators(project_id)?)
    }

    // Jobs

    /// Create a job in `Waiting`; nothing is dispatched until it is started.
    pub fn create_job(&self, request: NewJob) -> Result<GenerationJob, ApiError> {
        request.validate().map_err(ApiError::InvalidJob)?;
        let generator = self.generator(request.generator_id)?;
        if generator.project_id != request.project_id {
            return Err(ApiError::InvalidJob(format!(
                "generator {} belongs to project {}, not {}",
                generator.id, generator.project_id, request.project_id
            )));
        }

        let job = self.store.insert_job(request)?;
        info!(
            job_id = job.id,
            generator_id = job.generator_id,
            total = job.total_count,
            "Generation job created"
        );
        Ok(job)
    }

    pub fn job(&self, id: JobId) -> Result<GenerationJob, ApiError> {
        self.store.get_job(id)?.ok_or(ApiError::JobNotFound(id))
    }

    pub fn progress(&self, id: JobId) -> Result<JobProgress, ApiError> {
        Ok(JobProgress::of(&self.job(id)?))
    }

    pub fn list_jobs(
        &self,
        project_id: ProjectId,
        filter: JobFilter,
    ) -> Result<Vec<GenerationJob>, ApiError> {
        let mut jobs = self.store.list_jobs(project_id)?;
        jobs.retain(|job| filter.matches(job.status));
        Ok(jobs)
    }

    /// `Waiting | Stopped -> Running`, then dispatch a run.
    pub fn start(&self, job_id: JobId) -> Result<(GenerationJob, TaskHandle), ApiError> {
        self.launch(job_id, JobCommand::Start)
    }

    /// `Error | Stopped | Waiting -> Running`, then dispatch a run.
    pub fn retry(&self, job_id: JobId) -> Result<(GenerationJob, TaskHandle), ApiError> {
        self.launch(job_id, JobCommand::Retry)
    }

    /// `Running | Waiting -> Stopped`, and cancel the dispatched execution if any.
    pub fn stop(&self, job_id: JobId) -> Result<GenerationJob, ApiError> {
        let (_, job) = self.transition(job_id, JobCommand::Stop, None)?;
        match job.task_handle.as_deref() {
            Some(handle) => {
                let cancelled = self.dispatcher.cancel(handle);
                info!(job_id, handle, cancelled, "Generation job stopped");
            }
            None => info!(job_id, "Generation job stopped before dispatch"),
        }
        Ok(job)
    }

    /// Reserve a handle, move to `Running` with the handle stored, then submit.
    ///
    /// The handle is on the job before the execution exists, so a `stop` arriving at
    /// any point cancels or pre-empts this execution rather than an older one.
    fn launch(
        &self,
        job_id: JobId,
        command: JobCommand,
    ) -> Result<(GenerationJob, TaskHandle), ApiError> {
        let job = self.job(job_id)?;
        self.generator(job.generator_id)?;

        let handle = self.dispatcher.reserve(job_id);
        let (before, job) = self.transition(job_id, command, Some(&handle))?;
        if let Err(err) = self.dispatcher.submit(job_id, &handle) {
            // nothing will run under this handle; put the job back
            self.store
                .update_job(job_id, &mut |job: &mut GenerationJob| {
                    if job.task_handle.as_deref() == Some(handle.as_str()) {
                        job.status = before.status;
                        job.task_handle = before.task_handle.clone();
                    }
                })
                .map_err(|e| not_found_or(e, job_id))?;
            return Err(err);
        }

        info!(job_id, handle = %handle, command = command.as_str(), "Generation job dispatched");
        Ok((job, handle))
    }

    /// Apply `command` atomically against the stored status, storing `handle` along
    /// with an accepted transition. Returns the job before and after.
    fn transition(
        &self,
        job_id: JobId,
        command: JobCommand,
        handle: Option<&str>,
    ) -> Result<(GenerationJob, GenerationJob), ApiError> {
        let mut refused: Option<(Rejection, JobStatus)> = None;
        let mut before: Option<GenerationJob> = None;
        let job = self
            .store
            .update_job(job_id, &mut |job: &mut GenerationJob| {
                refused = None;
                before = Some(job.clone());
                match job.status.apply(command) {
                    Ok(next) => {
                        job.status = next;
                        if let Some(handle) = handle {
                            job.task_handle = Some(handle.to_string());
                        }
                    }
                    Err(rejection) => refused = Some((rejection, job.status)),
                }
            })
            .map_err(|e| not_found_or(e, job_id))?;

        match refused {
            None => Ok((before.unwrap_or_else(|| job.clone()), job)),
            Some((Rejection::AlreadyRunning, _)) => Err(ApiError::AlreadyRunning { job_id }),
            Some((Rejection::NotAllowed, status)) => Err(ApiError::InvalidTransition {
                job_id,
                action: command.as_str(),
                status,
            }),
        }
    }

    // Dialogs

    pub fn dialog(&self, id: DialogId) -> Result<Dialog, ApiError> {
        self.store.get_dialog(id)?.ok_or(ApiError::DialogNotFound(id))
    }

    pub fn list_dialogs(
        &self,
        query: DialogQuery,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<Dialog>, ApiError> {
        let mut dialogs = self.store.list_dialogs(query)?;
        if let Some(status) = status {
            dialogs.retain(|dialog| dialog.status == status);
        }
        Ok(dialogs)
    }

    /// Apply a reviewer edit and mark the dialog as edited.
    pub fn edit_dialog(&self, id: DialogId, edit: DialogEdit) -> Result<Dialog, ApiError> {
        let current = self.dialog(id)?;
        if let DialogEdit::Attr { field, .. } = &edit {
            if !current.attrs.contains_key(field) {
                return Err(ApiError::InvalidEdit(format!(
                    "dialog {} has no attribute '{}'",
                    id, field
                )));
            }
        }

        let dialog = self
            .store
            .update_dialog(id, &mut |dialog: &mut Dialog| {
                match &edit {
                    DialogEdit::Content(content) => dialog.content = content.clone(),
                    DialogEdit::Attr { field, value } => {
                        dialog.attrs.insert(field.clone(), value.clone());
                    }
                }
                dialog.edited = true;
            })
            .map_err(|e| dialog_not_found_or(e, id))?;
        info!(dialog_id = id, "Dialog edited");
        Ok(dialog)
    }

    pub fn set_dialog_status(&self, id: DialogId, status: ReviewStatus) -> Result<Dialog, ApiError> {
        let dialog = self
            .store
            .update_dialog(id, &mut |dialog: &mut Dialog| dialog.status = status)
            .map_err(|e| dialog_not_found_or(e, id))?;
        info!(dialog_id = id, status = %status, "Dialog review status changed");
        Ok(dialog)
    }

    // Feedback

    /// Attach (or replace) a user's feedback on a dialog.
    pub fn add_feedback(
        &self,
        dialog_id: DialogId,
        user_id: UserId,
        comment: String,
        content: serde_json::Value,
    ) -> Result<Feedback, ApiError> {
        let dialog = self.dialog(dialog_id)?;
        let feedback = Feedback {
            dialog_id,
            project_id: dialog.project_id,
            user_id,
            comment,
            content,
            created_at: Utc::now(),
        };
        self.store.put_feedback(&feedback)?;
        info!(dialog_id, user_id, "Feedback recorded");
        Ok(feedback)
    }

    pub fn list_feedback(&self, dialog_id: DialogId) -> Result<Vec<Feedback>, ApiError> {
        self.dialog(dialog_id)?;
        Ok(self.store.list_feedback(dialog_id)?)
    }
}

fn not_found_or(err: StorageError, job_id: JobId) -> ApiError {
    match err {
        StorageError::JobNotFound(_) => ApiError::JobNotFound(job_id),
        other => ApiError::StorageError(other),
    }
}

fn dialog_not_found_or(err: StorageError, id: DialogId) -> ApiError {
    match err {
        StorageError::DialogNotFound(_) => ApiError::DialogNotFound(id),
        other => ApiError::StorageError(other),
    }
}
