//! Active-run registry: which runs are currently executing.
//!
//! The priority calculator consults it to tell a resumed run from a new one.
//! It is always passed in explicitly so its lifecycle is owned by the caller.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Lookup of runs currently known to be executing.
#[async_trait]
pub trait ActiveRunRegistry: Send + Sync {
    /// Point-in-time membership check.
    async fn has(&self, run_id: &str) -> bool;

    /// Record a run as executing.
    async fn mark_active(&self, run_id: &str);

    /// Forget a run. Returns whether it was present.
    async fn remove(&self, run_id: &str) -> bool;
}

/// Process-local registry backed by a `HashSet`.
#[derive(Default)]
pub struct InMemoryRunRegistry {
    runs: RwLock<HashSet<String>>,
}

impl InMemoryRunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the given run ids.
    pub fn with_runs<I, S>(runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            runs: RwLock::new(runs.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

#[async_trait]
impl ActiveRunRegistry for InMemoryRunRegistry {
    async fn has(&self, run_id: &str) -> bool {
        self.runs.read().await.contains(run_id)
    }

    async fn mark_active(&self, run_id: &str) {
        self.runs.write().await.insert(run_id.to_string());
    }

    async fn remove(&self, run_id: &str) -> bool {
        self.runs.write().await.remove(run_id)
    }
}
