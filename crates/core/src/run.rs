//! Run submission payload handed to the scheduler by API callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a run (one execution of a routine).
pub type RunId = String;

/// Originating context that caused a run to be started.
///
/// Unrecognized trigger strings are kept verbatim in [`RunFrom::Unknown`] so
/// they survive a serialize/deserialize cycle through the backing queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunFrom {
    RunView,
    Api,
    Chat,
    Webhook,
    Bot,
    Schedule,
    Test,
    Unknown(String),
}

impl RunFrom {
    pub fn as_str(&self) -> &str {
        match self {
            RunFrom::RunView => "RunView",
            RunFrom::Api => "Api",
            RunFrom::Chat => "Chat",
            RunFrom::Webhook => "Webhook",
            RunFrom::Bot => "Bot",
            RunFrom::Schedule => "Schedule",
            RunFrom::Test => "Test",
            RunFrom::Unknown(raw) => raw,
        }
    }
}

impl From<String> for RunFrom {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "RunView" => RunFrom::RunView,
            "Api" => RunFrom::Api,
            "Chat" => RunFrom::Chat,
            "Webhook" => RunFrom::Webhook,
            "Bot" => RunFrom::Bot,
            "Schedule" => RunFrom::Schedule,
            "Test" => RunFrom::Test,
            _ => RunFrom::Unknown(raw),
        }
    }
}

impl From<&str> for RunFrom {
    fn from(raw: &str) -> Self {
        RunFrom::from(raw.to_string())
    }
}

impl From<RunFrom> for String {
    fn from(value: RunFrom) -> Self {
        match value {
            RunFrom::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for RunFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal user context needed for prioritization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    #[serde(default)]
    pub has_premium: bool,
}

/// Caller-declared scheduling hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default)]
    pub is_time_sensitive: bool,
}

/// Input to the task enqueuer.
///
/// `run_id` is optional at the type level: a submission without one is still
/// accepted and forwarded, leaving validation to the worker that processes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default)]
    pub routine_id: String,
    #[serde(default)]
    pub routine_version_id: String,
    #[serde(default = "default_is_new_run")]
    pub is_new_run: bool,
    pub run_from: RunFrom,
    pub user_data: UserData,
    #[serde(default)]
    pub config: RunConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<RunId>,
}

fn default_is_new_run() -> bool {
    true
}

impl RunSubmission {
    /// A fresh, non-premium, non-time-sensitive submission.
    pub fn new(run_id: impl Into<RunId>, run_from: RunFrom, user_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            routine_id: String::new(),
            routine_version_id: String::new(),
            is_new_run: true,
            run_from,
            user_data: UserData {
                id: user_id.into(),
                has_premium: false,
            },
            config: RunConfig::default(),
            parent_run_id: None,
        }
    }

    pub fn with_routine(
        mut self,
        routine_id: impl Into<String>,
        routine_version_id: impl Into<String>,
    ) -> Self {
        self.routine_id = routine_id.into();
        self.routine_version_id = routine_version_id.into();
        self
    }

    pub fn premium(mut self, has_premium: bool) -> Self {
        self.user_data.has_premium = has_premium;
        self
    }

    pub fn time_sensitive(mut self, is_time_sensitive: bool) -> Self {
        self.config.is_time_sensitive = is_time_sensitive;
        self
    }

    /// Mark this submission as continuing an existing run.
    pub fn resuming(mut self) -> Self {
        self.is_new_run = false;
        self
    }

    pub fn with_parent(mut self, parent_run_id: impl Into<RunId>) -> Self {
        self.parent_run_id = Some(parent_run_id.into());
        self
    }

    /// The run id, if the caller supplied a non-empty one.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref().filter(|id| !id.is_empty())
    }
}
