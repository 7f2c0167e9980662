//! Queue error types.

use runq_core::{CoreError, JobStatus};
use thiserror::Error;

/// Hard failures of the run task queue.
///
/// Expected absence (an unknown job id) is never an error: it surfaces as
/// `success: false` or `status: None` in the operation's `Ok` value.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt job record: {0}")]
    Corrupt(#[from] CoreError),

    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
}
