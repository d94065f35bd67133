//! Sled-backed generation store

use crate::dialog::{Dialog, DialogQuery, Feedback};
use crate::error::StorageError;
use crate::generator::{Generator, NewGenerator};
use crate::job::{GenerationJob, NewJob};
use crate::store::GenerationStore;
use crate::types::{DialogId, GeneratorId, JobId, ProjectId};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::debug;

const TREE_GENERATORS: &str = "generators";
const TREE_JOBS: &str = "generation_jobs";
const TREE_DIALOGS: &str = "dialogs";
const TREE_JOB_DIALOGS: &str = "job_dialogs";
const TREE_FEEDBACK: &str = "feedback";

/// Sled-based implementation of GenerationStore
#[derive(Clone)]
pub struct SledGenerationStore {
    db: Db,
    generators: Tree,
    jobs: Tree,
    dialogs: Tree,
    /// job id ++ dialog id -> ()
    job_dialogs: Tree,
    /// dialog id ++ user id -> Feedback
    feedback: Tree,
}

impl SledGenerationStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        Ok(Self {
            generators: db.open_tree(TREE_GENERATORS).map_err(to_storage_io)?,
            jobs: db.open_tree(TREE_JOBS).map_err(to_storage_io)?,
            dialogs: db.open_tree(TREE_DIALOGS).map_err(to_storage_io)?,
            job_dialogs: db.open_tree(TREE_JOB_DIALOGS).map_err(to_storage_io)?,
            feedback: db.open_tree(TREE_FEEDBACK).map_err(to_storage_io)?,
            db,
        })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64, StorageError> {
        // sled ids start at 0; keep 0 free so it never looks like an unset id
        Ok(self.db.generate_id().map_err(to_storage_io)? + 1)
    }
}

impl GenerationStore for SledGenerationStore {
    fn insert_generator(&self, request: NewGenerator) -> Result<Generator, StorageError> {
        let generator = request.into_generator(self.next_id()?, Utc::now());
        self.generators
            .insert(&id_key(generator.id)[..], encode(&generator)?)
            .map_err(to_storage_io)?;
        Ok(generator)
    }

    fn get_generator(&self, id: GeneratorId) -> Result<Option<Generator>, StorageError> {
        get_record(&self.generators, &id_key(id))
    }

    fn list_generators(&self, project_id: ProjectId) -> Result<Vec<Generator>, StorageError> {
        let all: Vec<Generator> = scan(&self.generators)?;
        Ok(all
            .into_iter()
            .filter(|g| g.project_id == project_id)
            .collect())
    }

    fn insert_job(&self, request: NewJob) -> Result<GenerationJob, StorageError> {
        let job = request.into_job(self.next_id()?, Utc::now());
        self.jobs
            .insert(&id_key(job.id)[..], encode(&job)?)
            .map_err(to_storage_io)?;
        Ok(job)
    }

    fn get_job(&self, id: JobId) -> Result<Option<GenerationJob>, StorageError> {
        get_record(&self.jobs, &id_key(id))
    }

    fn list_jobs(&self, project_id: ProjectId) -> Result<Vec<GenerationJob>, StorageError> {
        let all: Vec<GenerationJob> = scan(&self.jobs)?;
        Ok(all
            .into_iter()
            .filter(|j| j.project_id == project_id)
            .collect())
    }

    fn update_job(
        &self,
        id: JobId,
        update: &mut dyn FnMut(&mut GenerationJob),
    ) -> Result<GenerationJob, StorageError> {
        update_record(&self.jobs, &id_key(id), || StorageError::JobNotFound(id), update)
    }

    fn record_dialog(
        &self,
        job_id: JobId,
        content: &str,
        attrs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(Dialog, GenerationJob), StorageError> {
        let dialog_id = self.next_id()?;
        let job_key = id_key(job_id);
        let dialog_key = id_key(dialog_id);
        let index_key = pair_key(job_id, dialog_id);

        let result: Result<(Dialog, GenerationJob), TransactionError<StorageError>> =
            (&self.jobs, &self.dialogs, &self.job_dialogs).transaction(
                |(jobs, dialogs, job_dialogs)| {
                    let raw = jobs.get(&job_key[..])?.ok_or(
                        ConflictableTransactionError::Abort(StorageError::JobNotFound(job_id)),
                    )?;
                    let mut job: GenerationJob =
                        decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                    if job.generated_count >= job.total_count {
                        return Err(ConflictableTransactionError::Abort(
                            StorageError::CounterOverflow {
                                job_id,
                                generated: job.generated_count,
                                total: job.total_count,
                            },
                        ));
                    }
                    job.generated_count += 1;

                    let dialog = Dialog::generated(
                        dialog_id,
                        job.project_id,
                        job.id,
                        job.generator_id,
                        content.to_string(),
                        attrs.clone(),
                    );

                    let job_value = encode(&job).map_err(ConflictableTransactionError::Abort)?;
                    let dialog_value =
                        encode(&dialog).map_err(ConflictableTransactionError::Abort)?;
                    jobs.insert(&job_key[..], job_value)?;
                    dialogs.insert(&dialog_key[..], dialog_value)?;
                    job_dialogs.insert(&index_key[..], Vec::<u8>::new())?;
                    Ok((dialog, job))
                },
            );

        let (dialog, job) = result.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => to_storage_io(err),
        })?;
        debug!(
            job_id,
            dialog_id,
            generated_count = job.generated_count,
            "Recorded generated dialog"
        );
        Ok((dialog, job))
    }

    fn get_dialog(&self, id: DialogId) -> Result<Option<Dialog>, StorageError> {
        get_record(&self.dialogs, &id_key(id))
    }

    fn list_dialogs(&self, query: DialogQuery) -> Result<Vec<Dialog>, StorageError> {
        match query {
            DialogQuery::Job(job_id) => {
                let mut out = Vec::new();
                for item in self.job_dialogs.scan_prefix(id_key(job_id)) {
                    let (key, _) = item.map_err(to_storage_io)?;
                    let dialog_id = split_pair_key(&key)?.1;
                    if let Some(dialog) = self.get_dialog(dialog_id)? {
                        out.push(dialog);
                    }
                }
                Ok(out)
            }
            DialogQuery::Project(project_id) => {
                let all: Vec<Dialog> = scan(&self.dialogs)?;
                Ok(all
                    .into_iter()
                    .filter(|d| d.project_id == project_id)
                    .collect())
            }
        }
    }

    fn update_dialog(
        &self,
        id: DialogId,
        update: &mut dyn FnMut(&mut Dialog),
    ) -> Result<Dialog, StorageError> {
        update_record(
            &self.dialogs,
            &id_key(id),
            || StorageError::DialogNotFound(id),
            update,
        )
    }

    fn put_feedback(&self, feedback: &Feedback) -> Result<(), StorageError> {
        let key = pair_key(feedback.dialog_id, feedback.user_id);
        self.feedback
            .insert(&key[..], encode(feedback)?)
            .map_err(to_storage_io)?;
        Ok(())
    }

    fn list_feedback(&self, dialog_id: DialogId) -> Result<Vec<Feedback>, StorageError> {
        let mut out = Vec::new();
        for item in self.feedback.scan_prefix(id_key(dialog_id)) {
            let (_, value) = item.map_err(to_storage_io)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }
}

/// Big-endian keys keep sled's byte order equal to id order.
fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn pair_key(first: u64, second: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&first.to_be_bytes());
    key[8..].copy_from_slice(&second.to_be_bytes());
    key
}

fn split_pair_key(key: &[u8]) -> Result<(u64, u64), StorageError> {
    if key.len() != 16 {
        return Err(StorageError::Corrupt(format!(
            "index key has {} bytes, expected 16",
            key.len()
        )));
    }
    let mut first = [0u8; 8];
    let mut second = [0u8; 8];
    first.copy_from_slice(&key[..8]);
    second.copy_from_slice(&key[8..]);
    Ok((u64::from_be_bytes(first), u64::from_be_bytes(second)))
}

fn get_record<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>, StorageError> {
    let Some(raw) = tree.get(key).map_err(to_storage_io)? else {
        return Ok(None);
    };
    Ok(Some(decode(&raw)?))
}

fn scan<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StorageError> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (_, value) = item.map_err(to_storage_io)?;
        out.push(decode(&value)?);
    }
    Ok(out)
}

/// Compare-and-swap loop: re-read and re-apply until no other writer interleaves.
fn update_record<T: Serialize + DeserializeOwned>(
    tree: &Tree,
    key: &[u8],
    missing: impl Fn() -> StorageError,
    update: &mut dyn FnMut(&mut T),
) -> Result<T, StorageError> {
    loop {
        let current = tree.get(key).map_err(to_storage_io)?.ok_or_else(&missing)?;
        let mut record: T = decode(&current)?;
        update(&mut record);
        let next = encode(&record)?;
        match tree
            .compare_and_swap(key, Some(current), Some(next))
            .map_err(to_storage_io)?
        {
            Ok(()) => return Ok(record),
            Err(_) => continue,
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(to_storage_data)
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(raw).map_err(to_storage_data)
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}
