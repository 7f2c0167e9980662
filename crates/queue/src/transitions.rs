//! Status transition policy applied by the status gateway.

use serde::{Deserialize, Serialize};

use runq_core::JobStatus;

use crate::error::QueueError;

/// Which status changes the gateway forwards to the backing queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Forward every transition; the worker layer owns legality.
    #[default]
    Permissive,
    /// Reject leaving a terminal status and no-op self transitions.
    Strict,
}

impl TransitionPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }

    /// Whether the gateway needs the job's current status to apply this policy.
    pub fn needs_current_status(self) -> bool {
        self == TransitionPolicy::Strict
    }

    pub fn allows(self, from: JobStatus, to: JobStatus) -> bool {
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => !from.is_terminal() && from != to,
        }
    }

    pub fn check(self, from: JobStatus, to: JobStatus) -> Result<(), QueueError> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(QueueError::IllegalTransition { from, to })
        }
    }
}
