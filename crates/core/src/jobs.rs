//! Job payloads carried inside `stats`, `jobs` and `job_update` envelopes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Lifecycle state of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// The wire value, also accepted as a `get_jobs` status filter.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    High,
    Medium,
    Low,
}

/// Aggregated counts for the connected user's jobs.
///
/// `avg_wait_time` is only present in replies to `get_stats`; pushed
/// stats updates omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub status_counts: BTreeMap<JobStatus, u64>,
    #[serde(default)]
    pub priority_counts: BTreeMap<JobPriority, u64>,
    #[serde(default)]
    pub avg_wait_time: Option<f64>,
    pub total_jobs: u64,
}

impl JobStats {
    /// Count for one status, treating a missing entry as zero.
    pub fn count(&self, status: JobStatus) -> u64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}

/// One job as listed by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub deadline: Option<Timestamp>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Seconds between creation and start (or now, if not started).
    pub wait_time: Option<f64>,
    /// Seconds between start and completion.
    pub duration: Option<f64>,
    /// Presentation hint chosen by the backend (e.g. `"success"`).
    #[serde(default)]
    pub status_color: String,
}
