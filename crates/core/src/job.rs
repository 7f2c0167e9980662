//! Job types shared between the scheduler and its backing queues.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::run::RunSubmission;

/// Queue-assigned job identifier. Distinct from the run id.
pub type JobId = String;

/// Namespace tag for jobs belonging to the run task family.
pub const RUN_NAMESPACE: &str = "run";

/// Highest (least urgent) priority value.
pub const MAX_PRIORITY: u8 = 100;

/// Kind of work a job represents.
///
/// Several task families may share one backing store; the type tag keeps
/// them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    RunStart,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::RunStart => "run-start",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run-start" => Ok(TaskType::RunStart),
            other => Err(CoreError::UnknownTaskType(other.to_string())),
        }
    }
}

/// Job lifecycle status.
///
/// `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Scheduled,
    Running,
    Processing,
    Completing,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Scheduled,
        JobStatus::Running,
        JobStatus::Processing,
        JobStatus::Completing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
        JobStatus::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Scheduled => "Scheduled",
            JobStatus::Running => "Running",
            JobStatus::Processing => "Processing",
            JobStatus::Completing => "Completing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Paused => "Paused",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether a worker currently holds the job.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Running | JobStatus::Processing | JobStatus::Completing
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}

/// What the enqueuer hands to a backing queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub namespace: String,
    pub status: JobStatus,
    pub payload: RunSubmission,
    pub priority: u8,
}

impl JobDescriptor {
    /// A `Scheduled` run-start descriptor in the run namespace.
    pub fn run_start(payload: RunSubmission, priority: u8) -> Self {
        Self {
            task_type: TaskType::RunStart,
            namespace: RUN_NAMESPACE.to_string(),
            status: JobStatus::Scheduled,
            payload,
            priority: priority.min(MAX_PRIORITY),
        }
    }
}

/// A job as stored by a backing queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub namespace: String,
    pub status: JobStatus,
    pub priority: u8,
    pub attempts_made: u32,
    pub payload: RunSubmission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Acting user of the most recent status change.
    pub updated_by: Option<String>,
    pub last_error: Option<String>,
    /// Earliest time a worker may claim the job (set by retry backoff).
    pub run_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn from_descriptor(id: JobId, descriptor: JobDescriptor) -> Self {
        let now = Utc::now();
        Self {
            id,
            task_type: descriptor.task_type,
            namespace: descriptor.namespace,
            status: descriptor.status,
            priority: descriptor.priority,
            attempts_made: 0,
            payload: descriptor.payload,
            created_at: now,
            updated_at: now,
            updated_by: None,
            last_error: None,
            run_at: None,
        }
    }

    /// Whether a worker may claim this job at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Scheduled && self.run_at.map_or(true, |at| at <= now)
    }
}

/// One entry of a bulk status read. `status` is `None` for unknown ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub id: JobId,
    pub queue_name: String,
    pub status: Option<JobStatus>,
}

/// Outcome of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub success: bool,
}

/// Number of jobs per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub scheduled: usize,
    pub running: usize,
    pub processing: usize,
    pub completing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub paused: usize,
}

impl QueueCounts {
    pub fn record(&mut self, status: JobStatus) {
        self.add(status, 1);
    }

    pub fn add(&mut self, status: JobStatus, n: usize) {
        let slot = match status {
            JobStatus::Scheduled => &mut self.scheduled,
            JobStatus::Running => &mut self.running,
            JobStatus::Processing => &mut self.processing,
            JobStatus::Completing => &mut self.completing,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Cancelled => &mut self.cancelled,
            JobStatus::Paused => &mut self.paused,
        };
        *slot += n;
    }

    pub fn total(&self) -> usize {
        self.scheduled
            + self.running
            + self.processing
            + self.completing
            + self.completed
            + self.failed
            + self.cancelled
            + self.paused
    }
}
