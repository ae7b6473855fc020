//! Generation Job Model
//!
//! Jobs live only in process memory. Status moves strictly forward:
//! `pending -> processing -> {completed | failed}`.

use crate::models::Visibility;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_PRESET: &str = "balanced";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to turn a free-text query into a persisted moment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub query: String,
    pub preset: String,
    pub status: JobStatus,
    /// Path of the moment written on completion
    pub path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub visibility: Visibility,
}

impl Job {
    pub fn new(
        query: impl Into<String>,
        preset: Option<String>,
        user_id: Option<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            preset: preset.unwrap_or_else(|| DEFAULT_PRESET.to_string()),
            status: JobStatus::Pending,
            path: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            user_id,
            visibility,
        }
    }

    pub(crate) fn start(&mut self) {
        self.status = JobStatus::Processing;
    }

    pub(crate) fn complete(&mut self, path: String) {
        self.status = JobStatus::Completed;
        self.path = Some(path);
        self.completed_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }
}
