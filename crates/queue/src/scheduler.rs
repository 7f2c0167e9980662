//! Run scheduler: the façade callers use to enqueue runs, move their tasks
//! between statuses and read statuses back.
//!
//! The scheduler holds no locks of its own. Every operation is one or a few
//! awaited calls on the shared backing queue, so concurrent callers are
//! independent of each other.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use runq_core::{
    Job, JobDescriptor, JobId, JobStatus, QueueCounts, RunSubmission, StatusChange, StatusInfo,
    RUN_NAMESPACE,
};

use crate::backend::{QueueHealth, WorkerQueue};
use crate::error::QueueError;
use crate::priority::{PriorityCalculator, PriorityWeights};
use crate::registry::ActiveRunRegistry;
use crate::transitions::TransitionPolicy;

/// Handle to a freshly enqueued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuedJob {
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRunData {
    pub id: JobId,
}

/// Response shape of [`RunScheduler::process_run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRunResult {
    pub success: bool,
    pub data: Option<ProcessRunData>,
}

/// How a worker finished a claimed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed(String),
}

pub struct RunScheduler {
    queue: Arc<dyn WorkerQueue>,
    registry: Arc<dyn ActiveRunRegistry>,
    calculator: PriorityCalculator,
    policy: TransitionPolicy,
}

impl RunScheduler {
    pub fn new(queue: Arc<dyn WorkerQueue>, registry: Arc<dyn ActiveRunRegistry>) -> Self {
        let calculator = PriorityCalculator::new(Arc::clone(&registry));
        Self {
            queue,
            registry,
            calculator,
            policy: TransitionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_weights(mut self, weights: PriorityWeights) -> Self {
        self.calculator = PriorityCalculator::new(Arc::clone(&self.registry)).with_weights(weights);
        self
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn calculator(&self) -> &PriorityCalculator {
        &self.calculator
    }

    // ── Enqueue ───────────────────────────────────────────────

    /// Compute a priority for the submission and append a `RunStart` job.
    ///
    /// Backing queue errors are returned as-is; nothing is retried here.
    pub async fn enqueue(&self, submission: RunSubmission) -> Result<EnqueuedJob, QueueError> {
        if submission.run_id().is_none() {
            warn!(
                run_from = %submission.run_from,
                user_id = %submission.user_data.id,
                "Run submission has no runId; enqueuing anyway"
            );
        }

        let priority = self.calculator.compute_priority(&submission).await;
        let run_id = submission.run_id.clone();
        let descriptor = JobDescriptor::run_start(submission, priority);
        let job_id = self.queue.submit(descriptor).await?;

        info!(
            job_id = %job_id,
            run_id = run_id.as_deref().unwrap_or("-"),
            priority,
            "Run enqueued"
        );
        Ok(EnqueuedJob { job_id })
    }

    // ── Status gateway ────────────────────────────────────────

    /// Move a run task to `status` on behalf of `actor_id`.
    ///
    /// An unknown job id is `success: false`, never an error.
    pub async fn change_status(
        &self,
        job_id: &str,
        status: JobStatus,
        actor_id: &str,
    ) -> Result<StatusChange, QueueError> {
        if self.policy.needs_current_status() {
            let Some(job) = self.queue.get_job(job_id).await? else {
                debug!(job_id, "Status change for unknown job");
                return Ok(StatusChange { success: false });
            };
            if job.namespace != RUN_NAMESPACE {
                return Ok(StatusChange { success: false });
            }
            if let Err(e) = self.policy.check(job.status, status) {
                warn!(job_id, from = %job.status, to = %status, actor_id, "Rejected status transition");
                return Err(e);
            }
        }

        let success = self
            .queue
            .set_status(RUN_NAMESPACE, job_id, status, actor_id)
            .await?;

        if success {
            info!(job_id, status = %status, actor_id, "Run task status changed");
        } else {
            debug!(job_id, "Status change for unknown job");
        }
        Ok(StatusChange { success })
    }

    // ── Bulk status reader ────────────────────────────────────

    /// One entry per input id, in input order. Unknown ids map to `status: None`.
    ///
    /// A stored job that cannot be decoded is reported as `None` as well; only
    /// transport failures fail the batch.
    pub async fn get_statuses(&self, job_ids: &[JobId]) -> Result<Vec<StatusInfo>, QueueError> {
        let lookups = job_ids.iter().map(|id| async move {
            let status = match self.queue.get_job(id).await {
                Ok(job) => job.map(|j| j.status),
                Err(QueueError::Corrupt(e)) => {
                    warn!(job_id = %id, error = %e, "Unreadable job record in status batch");
                    None
                }
                Err(e) => return Err(e),
            };
            Ok(StatusInfo {
                id: id.clone(),
                queue_name: RUN_NAMESPACE.to_string(),
                status,
            })
        });
        try_join_all(lookups).await
    }

    // ── Outbound operations ───────────────────────────────────

    pub async fn process_run(&self, submission: RunSubmission) -> Result<ProcessRunResult, QueueError> {
        let enqueued = self.enqueue(submission).await?;
        Ok(ProcessRunResult {
            success: true,
            data: Some(ProcessRunData { id: enqueued.job_id }),
        })
    }

    pub async fn change_run_task_status(
        &self,
        job_id: &str,
        status: JobStatus,
        user_id: &str,
    ) -> Result<StatusChange, QueueError> {
        self.change_status(job_id, status, user_id).await
    }

    pub async fn get_run_task_statuses(
        &self,
        job_ids: &[JobId],
    ) -> Result<Vec<StatusInfo>, QueueError> {
        self.get_statuses(job_ids).await
    }

    // ── Worker side ───────────────────────────────────────────

    /// Claim the most urgent run and record it as active.
    pub async fn claim_next_run(&self) -> Result<Option<Job>, QueueError> {
        let Some(job) = self.queue.claim_next(RUN_NAMESPACE).await? else {
            return Ok(None);
        };

        match job.payload.run_id() {
            Some(run_id) => self.registry.mark_active(run_id).await,
            None => warn!(job_id = %job.id, "Claimed run has no runId; not registered"),
        }
        debug!(job_id = %job.id, priority = job.priority, attempt = job.attempts_made, "Run claimed");
        Ok(Some(job))
    }

    /// Report a claimed run's outcome and return the job's resulting status.
    ///
    /// A job that left the active statuses meanwhile (cancelled or paused)
    /// keeps its status. The run leaves the registry once its job is terminal;
    /// a failure that will be retried keeps it registered. Returns `None` for
    /// unknown ids.
    pub async fn finish_run(
        &self,
        job_id: &str,
        outcome: RunOutcome,
    ) -> Result<Option<JobStatus>, QueueError> {
        let Some(job) = self.queue.get_job(job_id).await? else {
            return Ok(None);
        };

        let status = match outcome {
            RunOutcome::Succeeded => self.queue.complete(job_id).await?,
            RunOutcome::Failed(error) => self.queue.fail(job_id, &error).await?,
        };
        let Some(status) = status else {
            return Ok(None);
        };

        if status.is_terminal() {
            if let Some(run_id) = job.payload.run_id() {
                self.registry.remove(run_id).await;
            }
        }
        info!(job_id, status = %status, "Run finished");
        Ok(Some(status))
    }

    // ── Introspection ─────────────────────────────────────────

    pub async fn counts(&self) -> Result<QueueCounts, QueueError> {
        self.queue.counts().await
    }

    pub async fn health(&self) -> Result<QueueHealth, QueueError> {
        self.queue.health_check().await
    }
}
