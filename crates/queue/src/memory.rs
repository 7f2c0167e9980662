//! In-process backing queue.
//!
//! Jobs live in a `HashMap` keyed by id. A `BTreeMap` keyed on
//! `(priority, seq)` indexes the `Scheduled` jobs so a claim walks them in
//! priority order, FIFO among equals.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use runq_core::{Job, JobDescriptor, JobId, JobStatus, QueueCounts};

use crate::backend::{BackingQueue, QueueHealth, WorkerQueue};
use crate::error::QueueError;
use crate::retry::RetryPolicy;

struct Slot {
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Slot>,
    ready: BTreeMap<(u8, u64), JobId>,
    next_seq: u64,
}

impl State {
    fn index(&mut self, job_id: &str) {
        if let Some(slot) = self.jobs.get(job_id) {
            let key = (slot.job.priority, slot.seq);
            if slot.job.status == JobStatus::Scheduled {
                self.ready.insert(key, job_id.to_string());
            } else {
                self.ready.remove(&key);
            }
        }
    }
}

/// Backing queue held entirely in memory. Contents are lost on restart.
pub struct InMemoryQueue {
    state: Mutex<State>,
    retry: RetryPolicy,
    closed: AtomicBool,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl InMemoryQueue {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(State::default()),
            retry,
            closed: AtomicBool::new(false),
        }
    }

    /// Stop accepting operations. Every later call returns a connection error.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("In-memory queue shut down");
        }
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(QueueError::Connection("queue closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BackingQueue for InMemoryQueue {
    async fn submit(&self, descriptor: JobDescriptor) -> Result<JobId, QueueError> {
        self.ensure_open()?;
        let id = Uuid::new_v4().to_string();
        let job = Job::from_descriptor(id.clone(), descriptor);

        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.jobs.insert(id.clone(), Slot { seq, job });
        state.index(&id);

        debug!(job_id = %id, seq, "Job stored");
        Ok(id)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, QueueError> {
        self.ensure_open()?;
        let state = self.state.lock().await;
        Ok(state.jobs.get(job_id).map(|slot| slot.job.clone()))
    }

    async fn set_status(
        &self,
        namespace: &str,
        job_id: &str,
        status: JobStatus,
        actor_id: &str,
    ) -> Result<bool, QueueError> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;

        let Some(slot) = state.jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if slot.job.namespace != namespace {
            return Ok(false);
        }

        // Index key must be read before the status moves.
        let key = (slot.job.priority, slot.seq);
        slot.job.status = status;
        slot.job.updated_at = Utc::now();
        slot.job.updated_by = Some(actor_id.to_string());
        if status == JobStatus::Scheduled {
            slot.job.run_at = None;
        }
        state.ready.remove(&key);
        state.index(job_id);
        Ok(true)
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        self.ensure_open()?;
        let state = self.state.lock().await;
        let mut counts = QueueCounts::default();
        for slot in state.jobs.values() {
            counts.record(slot.job.status);
        }
        Ok(counts)
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(QueueHealth {
                connected: false,
                provider: "memory".to_string(),
                pending: None,
            });
        }
        let state = self.state.lock().await;
        Ok(QueueHealth {
            connected: true,
            provider: "memory".to_string(),
            pending: Some(state.ready.len() as u64),
        })
    }
}

#[async_trait]
impl WorkerQueue for InMemoryQueue {
    async fn claim_next(&self, namespace: &str) -> Result<Option<Job>, QueueError> {
        self.ensure_open()?;
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let picked = state.ready.iter().find_map(|(key, id)| {
            let slot = state.jobs.get(id)?;
            (slot.job.namespace == namespace && slot.job.is_claimable(now))
                .then(|| (*key, id.clone()))
        });
        let Some((key, id)) = picked else {
            return Ok(None);
        };

        state.ready.remove(&key);
        let Some(slot) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        slot.job.status = JobStatus::Running;
        slot.job.attempts_made += 1;
        slot.job.run_at = None;
        slot.job.updated_at = now;

        debug!(job_id = %id, attempt = slot.job.attempts_made, "Job claimed");
        Ok(Some(slot.job.clone()))
    }

    async fn complete(&self, job_id: &str) -> Result<Option<JobStatus>, QueueError> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        let Some(slot) = state.jobs.get_mut(job_id) else {
            return Ok(None);
        };
        if !slot.job.status.is_active() {
            debug!(job_id, status = %slot.job.status, "Completion ignored for inactive job");
            return Ok(Some(slot.job.status));
        }
        slot.job.status = JobStatus::Completed;
        slot.job.updated_at = Utc::now();
        Ok(Some(JobStatus::Completed))
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<Option<JobStatus>, QueueError> {
        self.ensure_open()?;
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let Some(slot) = state.jobs.get_mut(job_id) else {
            return Ok(None);
        };
        if !slot.job.status.is_active() {
            debug!(job_id, status = %slot.job.status, "Failure ignored for inactive job");
            return Ok(Some(slot.job.status));
        }

        slot.job.last_error = Some(error.to_string());
        slot.job.updated_at = now;

        let attempts = slot.job.attempts_made;
        if self.retry.should_retry(attempts) {
            let run_at = self.retry.retry_at(attempts, now);
            slot.job.status = JobStatus::Scheduled;
            slot.job.run_at = Some(run_at);
            debug!(job_id, attempts, run_at = %run_at, "Job rescheduled");
        } else {
            slot.job.status = JobStatus::Failed;
            slot.job.run_at = None;
            warn!(job_id, attempts, error, "Job failed permanently");
        }

        let status = slot.job.status;
        state.index(job_id);
        Ok(Some(status))
    }
}
