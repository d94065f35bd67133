//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain errors to a message for the terminal.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::AlreadyRunning { job_id } => {
            format!("Job {} is already running; stop it first or wait for it to end", job_id)
        }
        ApiError::InvalidTransition {
            job_id,
            action: "start",
            status: crate::job::JobStatus::Error,
        } => format!("Job {} failed; use `job retry {}` to run it again", job_id, job_id),
        ApiError::ConfigError(msg) => format!("Configuration error: {}", msg),
        other => other.to_string(),
    }
}

/// Process exit code for a failed command
pub fn exit_code(e: &ApiError) -> i32 {
    match e {
        ApiError::JobNotFound(_) | ApiError::GeneratorNotFound(_) | ApiError::DialogNotFound(_) => 3,
        ApiError::AlreadyRunning { .. } | ApiError::InvalidTransition { .. } => 4,
        ApiError::ConfigError(_) => 2,
        _ => 1,
    }
}
