//! Error types for the dialogforge generation backend.

use crate::job::JobStatus;
use crate::types::{DialogId, GeneratorId, JobId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Generation job not found: {0}")]
    JobNotFound(JobId),

    #[error("Generator not found: {0}")]
    GeneratorNotFound(GeneratorId),

    #[error("Dialog not found: {0}")]
    DialogNotFound(DialogId),

    #[error("Counter overflow on job {job_id}: {generated} of {total} already generated")]
    CounterOverflow {
        job_id: JobId,
        generated: u64,
        total: u64,
    },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors returned by the generation API.
///
/// Each variant is one error class; the retry policy decides which classes
/// are worth another attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Unclassified provider failure: {0}")]
    Unclassified(String),
}

/// Domain errors surfaced by the job control surface and the CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Generation job not found: {0}")]
    JobNotFound(JobId),

    #[error("Generator not found: {0}")]
    GeneratorNotFound(GeneratorId),

    #[error("Dialog not found: {0}")]
    DialogNotFound(DialogId),

    #[error("Job {job_id} is already running")]
    AlreadyRunning { job_id: JobId },

    #[error("Cannot {action} job {job_id} while it is {status}")]
    InvalidTransition {
        job_id: JobId,
        action: &'static str,
        status: JobStatus,
    },

    #[error("Invalid generator: {0}")]
    InvalidGenerator(String),

    #[error("Invalid job request: {0}")]
    InvalidJob(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid dialog edit: {0}")]
    InvalidEdit(String),

    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
