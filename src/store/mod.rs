//! Generation Store
//!
//! Persistence for generators, jobs, dialogs, and feedback. A job row is the unit of
//! consistency: every mutation of a job is an atomic read-modify-write, and recording a
//! dialog advances the job's counter in the same transaction.

pub mod persistence;

pub use persistence::SledGenerationStore;

use crate::dialog::{Dialog, DialogQuery, Feedback};
use crate::error::StorageError;
use crate::generator::{Generator, NewGenerator};
use crate::job::{GenerationJob, NewJob};
use crate::types::{DialogId, GeneratorId, JobId, ProjectId};
use std::collections::BTreeMap;

/// Generation store interface
pub trait GenerationStore: Send + Sync {
    fn insert_generator(&self, request: NewGenerator) -> Result<Generator, StorageError>;
    fn get_generator(&self, id: GeneratorId) -> Result<Option<Generator>, StorageError>;
    fn list_generators(&self, project_id: ProjectId) -> Result<Vec<Generator>, StorageError>;

    fn insert_job(&self, request: NewJob) -> Result<GenerationJob, StorageError>;
    fn get_job(&self, id: JobId) -> Result<Option<GenerationJob>, StorageError>;
    fn list_jobs(&self, project_id: ProjectId) -> Result<Vec<GenerationJob>, StorageError>;

    /// Atomically apply `update` to the stored job and return the stored result.
    ///
    /// `update` may run more than once if another writer races the same row.
    fn update_job(
        &self,
        id: JobId,
        update: &mut dyn FnMut(&mut GenerationJob),
    ) -> Result<GenerationJob, StorageError>;

    /// Persist one generated dialog and increment the job's `generated_count`.
    ///
    /// Fails with `CounterOverflow` instead of pushing the count past `total_count`.
    fn record_dialog(
        &self,
        job_id: JobId,
        content: &str,
        attrs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(Dialog, GenerationJob), StorageError>;

    fn get_dialog(&self, id: DialogId) -> Result<Option<Dialog>, StorageError>;
    fn list_dialogs(&self, query: DialogQuery) -> Result<Vec<Dialog>, StorageError>;
    fn update_dialog(
        &self,
        id: DialogId,
        update: &mut dyn FnMut(&mut Dialog),
    ) -> Result<Dialog, StorageError>;

    /// Store feedback; one entry per (dialog, user), later writes replace earlier ones.
    fn put_feedback(&self, feedback: &Feedback) -> Result<(), StorageError>;
    fn list_feedback(&self, dialog_id: DialogId) -> Result<Vec<Feedback>, StorageError>;
}
