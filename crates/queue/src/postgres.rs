//! PostgreSQL backing queue over the `run_jobs` table.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so several workers can poll the same
//! table without handing out a job twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use runq_core::{Job, JobDescriptor, JobId, JobStatus, QueueCounts, MAX_PRIORITY};

use crate::backend::{BackingQueue, QueueHealth, WorkerQueue};
use crate::error::QueueError;
use crate::retry::RetryPolicy;

/// Statuses a worker holds; `complete` and `fail` only touch these.
const ACTIVE_STATUSES: &str = "('Running', 'Processing', 'Completing')";

const JOB_COLUMNS: &str = "id, task_type, namespace, status, priority, attempts_made, payload, \
     created_at, updated_at, updated_by, last_error, run_at";

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    task_type: String,
    namespace: String,
    status: String,
    priority: i16,
    attempts_made: i32,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
    last_error: Option<String>,
    run_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = QueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id.to_string(),
            task_type: row.task_type.parse()?,
            namespace: row.namespace,
            status: row.status.parse()?,
            priority: row.priority.clamp(0, MAX_PRIORITY as i16) as u8,
            attempts_made: row.attempts_made.max(0) as u32,
            payload: serde_json::from_value(row.payload)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
            last_error: row.last_error,
            run_at: row.run_at,
        })
    }
}

/// Job ids are UUIDs; anything else cannot name a stored job.
fn parse_job_id(job_id: &str) -> Option<Uuid> {
    Uuid::parse_str(job_id).ok()
}

pub struct PgQueue {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgQueue {
    pub fn from_pool(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Apply the bundled schema migrations.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), QueueError> {
        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| QueueError::Connection(format!("migration failed: {e}")))?;
        info!("Database migrations applied successfully");
        Ok(())
    }
}

#[async_trait]
impl BackingQueue for PgQueue {
    async fn submit(&self, descriptor: JobDescriptor) -> Result<JobId, QueueError> {
        let id = Uuid::new_v4();
        let payload = serde_json::to_value(&descriptor.payload)?;

        sqlx::query(
            "INSERT INTO run_jobs (id, task_type, namespace, status, priority, payload)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(descriptor.task_type.as_str())
        .bind(&descriptor.namespace)
        .bind(descriptor.status.as_str())
        .bind(i16::from(descriptor.priority.min(MAX_PRIORITY)))
        .bind(payload)
        .execute(&self.pool)
        .await?;

        debug!(job_id = %id, priority = descriptor.priority, "Job inserted");
        Ok(id.to_string())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, QueueError> {
        let Some(id) = parse_job_id(job_id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM run_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn set_status(
        &self,
        namespace: &str,
        job_id: &str,
        status: JobStatus,
        actor_id: &str,
    ) -> Result<bool, QueueError> {
        let Some(id) = parse_job_id(job_id) else {
            return Ok(false);
        };

        let result = sqlx::query(
            "UPDATE run_jobs SET
                status = $3,
                updated_by = $4,
                updated_at = now(),
                run_at = CASE WHEN $3 = 'Scheduled' THEN NULL ELSE run_at END
             WHERE id = $1 AND namespace = $2",
        )
        .bind(id)
        .bind(namespace)
        .bind(status.as_str())
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM run_jobs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = QueueCounts::default();
        for (status, n) in rows {
            match status.parse::<JobStatus>() {
                Ok(status) => counts.add(status, n.max(0) as usize),
                Err(_) => warn!(status = %status, rows = n, "Skipping rows with unknown status"),
            }
        }
        Ok(counts)
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let pending = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM run_jobs WHERE status = 'Scheduled'",
        )
        .fetch_one(&self.pool)
        .await;

        match pending {
            Ok(n) => Ok(QueueHealth {
                connected: true,
                provider: "postgres".to_string(),
                pending: Some(n.max(0) as u64),
            }),
            Err(e) => {
                warn!(error = %e, "PostgreSQL health check failed");
                Ok(QueueHealth {
                    connected: false,
                    provider: "postgres".to_string(),
                    pending: None,
                })
            }
        }
    }
}

#[async_trait]
impl WorkerQueue for PgQueue {
    async fn claim_next(&self, namespace: &str) -> Result<Option<Job>, QueueError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE run_jobs SET
                status = 'Running',
                attempts_made = attempts_made + 1,
                run_at = NULL,
                updated_at = now()
             WHERE id = (
                SELECT id FROM run_jobs
                WHERE namespace = $1
                  AND status = 'Scheduled'
                  AND (run_at IS NULL OR run_at <= now())
                ORDER BY priority, seq
                FOR UPDATE SKIP LOCKED
                LIMIT 1
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn complete(&self, job_id: &str) -> Result<Option<JobStatus>, QueueError> {
        let Some(id) = parse_job_id(job_id) else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        let Some(current) = lock_status(&mut tx, id).await? else {
            return Ok(None);
        };
        if !current.is_active() {
            debug!(job_id, status = %current, "Completion ignored for inactive job");
            return Ok(Some(current));
        }

        sqlx::query(&format!(
            "UPDATE run_jobs SET status = 'Completed', updated_at = now()
             WHERE id = $1 AND status IN {ACTIVE_STATUSES}"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(JobStatus::Completed))
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<Option<JobStatus>, QueueError> {
        let Some(id) = parse_job_id(job_id) else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (String, i32)>(
            "SELECT status, attempts_made FROM run_jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((current, attempts)) = row else {
            return Ok(None);
        };
        let current: JobStatus = current.parse()?;
        if !current.is_active() {
            debug!(job_id, status = %current, "Failure ignored for inactive job");
            return Ok(Some(current));
        }
        let attempts = attempts.max(0) as u32;

        let (status, run_at) = if self.retry.should_retry(attempts) {
            (JobStatus::Scheduled, Some(self.retry.retry_at(attempts, Utc::now())))
        } else {
            (JobStatus::Failed, None)
        };

        sqlx::query(&format!(
            "UPDATE run_jobs SET status = $2, run_at = $3, last_error = $4, updated_at = now()
             WHERE id = $1 AND status IN {ACTIVE_STATUSES}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(run_at)
        .bind(error)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if status == JobStatus::Failed {
            warn!(job_id, attempts, error, "Job failed permanently");
        } else {
            debug!(job_id, attempts, "Job rescheduled");
        }
        Ok(Some(status))
    }
}

/// Read a job's status under a row lock held by `tx`.
async fn lock_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<Option<JobStatus>, QueueError> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM run_jobs WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    status
        .map(|s| s.parse::<JobStatus>())
        .transpose()
        .map_err(QueueError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use runq_core::{RunFrom, RunSubmission, TaskType, RUN_NAMESPACE};

    fn row(status: &str, priority: i16) -> JobRow {
        let payload = RunSubmission::new("run-1", RunFrom::Bot, "u");
        JobRow {
            id: Uuid::new_v4(),
            task_type: "run-start".to_string(),
            namespace: RUN_NAMESPACE.to_string(),
            status: status.to_string(),
            priority,
            attempts_made: 2,
            payload: serde_json::to_value(payload).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            updated_by: Some("u".into()),
            last_error: None,
            run_at: None,
        }
    }

    #[test]
    fn test_row_into_job() {
        let r = row("Paused", 93);
        let id = r.id;
        let job = Job::try_from(r).unwrap();
        assert_eq!(job.id, id.to_string());
        assert_eq!(job.task_type, TaskType::RunStart);
        assert_eq!(job.status, JobStatus::Paused);
        assert_eq!(job.priority, 93);
        assert_eq!(job.attempts_made, 2);
        assert_eq!(job.payload.run_from, RunFrom::Bot);
    }

    #[test]
    fn test_row_with_unknown_status_is_corrupt() {
        let err = Job::try_from(row("Exploded", 10)).unwrap_err();
        assert!(matches!(err, QueueError::Corrupt(_)));
    }

    #[test]
    fn test_row_priority_is_clamped() {
        assert_eq!(Job::try_from(row("Scheduled", 300)).unwrap().priority, 100);
        assert_eq!(Job::try_from(row("Scheduled", -4)).unwrap().priority, 0);
    }

    #[test]
    fn test_active_statuses_match_enum() {
        for status in JobStatus::ALL {
            let quoted = format!("'{}'", status.as_str());
            assert_eq!(
                ACTIVE_STATUSES.contains(&quoted),
                status.is_active(),
                "{status}"
            );
        }
    }

    #[test]
    fn test_parse_job_id() {
        assert!(parse_job_id("invalid-id").is_none());
        assert!(parse_job_id(&Uuid::new_v4().to_string()).is_some());
    }
}
