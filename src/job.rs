//! Generation Jobs
//!
//! A job asks for `total_count` dialogs from one generator with a fixed model and
//! temperature. Status is a closed state machine; control commands and runner outcomes
//! are the only ways to move it.

use crate::types::{GeneratorId, JobId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Waiting,
    Running,
    Finished,
    Stopped,
    Error,
}

/// Control command issued against a job from outside the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCommand {
    Start,
    Stop,
    Retry,
}

/// Why a control command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyRunning,
    NotAllowed,
}

impl JobCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            JobCommand::Start => "start",
            JobCommand::Stop => "stop",
            JobCommand::Retry => "retry",
        }
    }
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Waiting => "Waiting",
            JobStatus::Running => "Running",
            JobStatus::Finished => "Finished",
            JobStatus::Stopped => "Stopped",
            JobStatus::Error => "Error",
        }
    }

    /// Waiting or Running: the job still owes work without anyone asking again.
    pub fn is_unfinished(self) -> bool {
        !self.is_settled()
    }

    /// Statuses a run can end in
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Stopped | JobStatus::Error
        )
    }

    /// Apply a control command.
    ///
    /// `Error` is a dead end for `Start`; only `Retry` leaves it.
    pub fn apply(self, command: JobCommand) -> Result<JobStatus, Rejection> {
        match (command, self) {
            (JobCommand::Start | JobCommand::Retry, JobStatus::Running) => {
                Err(Rejection::AlreadyRunning)
            }
            (JobCommand::Start, JobStatus::Waiting | JobStatus::Stopped) => Ok(JobStatus::Running),
            (JobCommand::Start, JobStatus::Finished | JobStatus::Error) => {
                Err(Rejection::NotAllowed)
            }
            (JobCommand::Retry, JobStatus::Waiting | JobStatus::Stopped | JobStatus::Error) => {
                Ok(JobStatus::Running)
            }
            (JobCommand::Retry, JobStatus::Finished) => Err(Rejection::NotAllowed),
            (JobCommand::Stop, JobStatus::Waiting | JobStatus::Running) => Ok(JobStatus::Stopped),
            (JobCommand::Stop, JobStatus::Finished | JobStatus::Stopped | JobStatus::Error) => {
                Err(Rejection::NotAllowed)
            }
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Ok(JobStatus::Waiting),
            "running" => Ok(JobStatus::Running),
            "finished" => Ok(JobStatus::Finished),
            "stopped" => Ok(JobStatus::Stopped),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Job listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobFilter {
    #[default]
    All,
    /// Waiting and Running jobs
    Unfinished,
}

impl JobFilter {
    pub fn matches(self, status: JobStatus) -> bool {
        match self {
            JobFilter::All => true,
            JobFilter::Unfinished => status.is_unfinished(),
        }
    }
}

impl FromStr for JobFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(JobFilter::All),
            "unfinished" => Ok(JobFilter::Unfinished),
            other => Err(format!(
                "invalid job filter '{}' (must be 'all' or 'unfinished')",
                other
            )),
        }
    }
}

/// Persisted generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub project_id: ProjectId,
    pub generator_id: GeneratorId,
    pub name: String,
    pub model_name: String,
    pub temperature: f32,
    pub total_count: u64,
    pub generated_count: u64,
    /// Elapsed run time summed over every run segment
    pub duration_ms: u64,
    /// Handle of the most recently dispatched task
    pub task_handle: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Template variables supplied at creation; stored, not interpreted
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
}

impl GenerationJob {
    pub fn items_left(&self) -> u64 {
        self.total_count.saturating_sub(self.generated_count)
    }

    /// Fraction of the target generated so far; 0 for an empty target.
    pub fn progress(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.generated_count as f64 / self.total_count as f64
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Add one run segment's elapsed time to the accumulator.
    pub fn fold_duration(&mut self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.duration_ms = self.duration_ms.saturating_add(millis);
    }
}

/// Request to create a job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub project_id: ProjectId,
    pub generator_id: GeneratorId,
    pub name: Option<String>,
    pub model_name: String,
    pub temperature: f32,
    pub total_count: u64,
    pub variables: BTreeMap<String, serde_json::Value>,
}

impl NewJob {
    pub fn validate(&self) -> Result<(), String> {
        if self.model_name.trim().is_empty() {
            return Err("model name cannot be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} out of range (0.0-2.0)",
                self.temperature
            ));
        }
        Ok(())
    }

    pub(crate) fn into_job(self, id: JobId, created_at: DateTime<Utc>) -> GenerationJob {
        let name = self
            .name
            .unwrap_or_else(|| format!("job-{}", id));
        GenerationJob {
            id,
            project_id: self.project_id,
            generator_id: self.generator_id,
            name,
            model_name: self.model_name,
            temperature: self.temperature,
            total_count: self.total_count,
            generated_count: 0,
            duration_ms: 0,
            task_handle: None,
            status: JobStatus::Waiting,
            created_at,
            variables: self.variables,
        }
    }
}
