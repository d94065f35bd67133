//! Dialogs and the feedback collected on them.

use crate::types::{DialogId, GeneratorId, JobId, ProjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where a dialog came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    User,
    Generator,
}

/// Review status of a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Testing,
    Candidate,
    Canon,
    Removed,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Testing => "Testing",
            ReviewStatus::Candidate => "Candidate",
            ReviewStatus::Canon => "Canon",
            ReviewStatus::Removed => "Removed",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "testing" => Ok(ReviewStatus::Testing),
            "candidate" => Ok(ReviewStatus::Candidate),
            "canon" => Ok(ReviewStatus::Canon),
            "removed" => Ok(ReviewStatus::Removed),
            other => Err(format!("unknown dialog status '{}'", other)),
        }
    }
}

/// One generated (or user-written) dialog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    pub id: DialogId,
    pub project_id: ProjectId,
    pub content: String,
    pub generation_job_id: Option<JobId>,
    pub source_type: SourceType,
    pub source_id: Option<GeneratorId>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl Dialog {
    /// Dialog produced by one successful chain execution of a job.
    pub fn generated(
        id: DialogId,
        project_id: ProjectId,
        job_id: JobId,
        generator_id: GeneratorId,
        content: String,
        attrs: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id,
            project_id,
            content,
            generation_job_id: Some(job_id),
            source_type: SourceType::Generator,
            source_id: Some(generator_id),
            status: ReviewStatus::Candidate,
            created_at: Utc::now(),
            edited: false,
            attrs,
        }
    }
}

/// Which dialogs to list
#[derive(Debug, Clone, Copy)]
pub enum DialogQuery {
    Job(JobId),
    Project(ProjectId),
}

/// Reviewer feedback on a dialog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub dialog_id: DialogId,
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub comment: String,
    #[serde(default)]
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
