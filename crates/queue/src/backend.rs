//! Backing queue ports.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use runq_core::{Job, JobDescriptor, JobId, JobStatus, QueueCounts};

use crate::error::QueueError;

/// Health status of a backing queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Whether the backing store is reachable.
    pub connected: bool,
    /// Backend name (e.g., "memory", "postgres").
    pub provider: String,
    /// Number of jobs waiting in `Scheduled`.
    pub pending: Option<u64>,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, pending: {:?}, provider: {} }}",
            self.connected, self.pending, self.provider
        )
    }
}

/// The persistent job store the scheduler layers its policy on.
///
/// Implementations own their own concurrency control; callers never lock
/// across calls.
#[async_trait]
pub trait BackingQueue: Send + Sync {
    /// Append a job to the pending set and return its queue-assigned id.
    async fn submit(&self, descriptor: JobDescriptor) -> Result<JobId, QueueError>;

    /// Look up a job. Unknown or malformed ids yield `Ok(None)`.
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, QueueError>;

    /// Overwrite a job's status.
    ///
    /// Returns `Ok(false)` when no job with this id exists in `namespace`.
    async fn set_status(
        &self,
        namespace: &str,
        job_id: &str,
        status: JobStatus,
        actor_id: &str,
    ) -> Result<bool, QueueError>;

    /// Number of jobs per status.
    async fn counts(&self) -> Result<QueueCounts, QueueError>;

    /// Check connectivity and return health status.
    async fn health_check(&self) -> Result<QueueHealth, QueueError>;
}

/// Worker half of a backing queue: claiming jobs and reporting outcomes.
///
/// The backing queue owns `attempts_made` and the retry schedule.
#[async_trait]
pub trait WorkerQueue: BackingQueue {
    /// Claim the most urgent claimable job in `namespace`.
    ///
    /// Lowest priority value first; insertion order among equal priorities.
    /// The claimed job is `Running` with `attempts_made` incremented.
    async fn claim_next(&self, namespace: &str) -> Result<Option<Job>, QueueError>;

    /// Mark an active job `Completed`.
    ///
    /// A job that is not active (cancelled, paused or already finished) is
    /// left untouched. Returns the job's resulting status, or `None` for
    /// unknown ids.
    async fn complete(&self, job_id: &str) -> Result<Option<JobStatus>, QueueError>;

    /// Record a failed attempt of an active job.
    ///
    /// Re-schedules with backoff while attempts remain, otherwise marks the
    /// job `Failed`. A job that is not active is left untouched. Returns the
    /// resulting status, or `None` for unknown ids.
    async fn fail(&self, job_id: &str, error: &str) -> Result<Option<JobStatus>, QueueError>;
}
