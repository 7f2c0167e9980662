//! Run task queue.
//!
//! This crate provides:
//! - `PriorityCalculator` mapping a run submission to a priority in `[0, 100]`
//! - `ActiveRunRegistry` trait for detecting resumed runs, plus an in-memory registry
//! - `BackingQueue` / `WorkerQueue` ports with in-memory and PostgreSQL backends
//! - `TransitionPolicy` naming which status changes the gateway forwards
//! - `RunScheduler`, the façade callers use to enqueue runs and read or change job status

pub mod backend;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod priority;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod transitions;

pub use backend::{BackingQueue, QueueHealth, WorkerQueue};
pub use error::QueueError;
pub use memory::InMemoryQueue;
pub use postgres::PgQueue;
pub use priority::{PriorityCalculator, PriorityWeights};
pub use registry::{ActiveRunRegistry, InMemoryRunRegistry};
pub use retry::RetryPolicy;
pub use scheduler::{EnqueuedJob, ProcessRunData, ProcessRunResult, RunOutcome, RunScheduler};
pub use transitions::TransitionPolicy;
