//! Priority calculation for run submissions.
//!
//! Priority starts at 100 (least urgent) and each applicable signal subtracts
//! a weighted deduction. The result is clamped at 0. Lower values are
//! dequeued first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use runq_core::{RunFrom, RunSubmission, MAX_PRIORITY};

use crate::registry::ActiveRunRegistry;

/// Deduction weights applied by [`PriorityCalculator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub base: u32,
    pub run_view: u32,
    pub api: u32,
    pub chat: u32,
    pub webhook: u32,
    pub bot: u32,
    pub schedule: u32,
    pub test: u32,
    pub time_sensitive: u32,
    pub premium: u32,
    pub resuming: u32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            base: MAX_PRIORITY as u32,
            run_view: 20,
            api: 16,
            chat: 14,
            webhook: 10,
            bot: 7,
            schedule: 3,
            test: 1,
            time_sensitive: 15,
            premium: 5,
            resuming: 10,
        }
    }
}

impl PriorityWeights {
    /// Deduction for the trigger source. Unrecognized triggers deduct nothing.
    pub fn trigger_deduction(&self, run_from: &RunFrom) -> u32 {
        match run_from {
            RunFrom::RunView => self.run_view,
            RunFrom::Api => self.api,
            RunFrom::Chat => self.chat,
            RunFrom::Webhook => self.webhook,
            RunFrom::Bot => self.bot,
            RunFrom::Schedule => self.schedule,
            RunFrom::Test => self.test,
            RunFrom::Unknown(_) => 0,
        }
    }

    /// Score a submission once the resumption check has been made.
    ///
    /// Pure: no registry access.
    pub fn score(&self, submission: &RunSubmission, resuming: bool) -> u8 {
        let mut deduction = self.trigger_deduction(&submission.run_from);
        if submission.config.is_time_sensitive {
            deduction += self.time_sensitive;
        }
        if submission.user_data.has_premium {
            deduction += self.premium;
        }
        if resuming {
            deduction += self.resuming;
        }

        let base = self.base.min(MAX_PRIORITY as u32);
        base.saturating_sub(deduction) as u8
    }
}

/// Maps a run submission to a priority in `[0, 100]`.
pub struct PriorityCalculator {
    weights: PriorityWeights,
    registry: Arc<dyn ActiveRunRegistry>,
}

impl PriorityCalculator {
    pub fn new(registry: Arc<dyn ActiveRunRegistry>) -> Self {
        Self {
            weights: PriorityWeights::default(),
            registry,
        }
    }

    pub fn with_weights(mut self, weights: PriorityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Whether the submission continues a run the registry knows is executing.
    ///
    /// The registry is only consulted for non-new runs that carry a run id.
    pub async fn is_resuming(&self, submission: &RunSubmission) -> bool {
        if submission.is_new_run {
            return false;
        }
        match submission.run_id() {
            Some(run_id) => self.registry.has(run_id).await,
            None => false,
        }
    }

    pub async fn compute_priority(&self, submission: &RunSubmission) -> u8 {
        let resuming = self.is_resuming(submission).await;
        let priority = self.weights.score(submission, resuming);
        debug!(
            run_id = submission.run_id().unwrap_or("-"),
            run_from = %submission.run_from,
            resuming,
            priority,
            "Computed run priority"
        );
        priority
    }
}
