//! Why a feed or a run stopped.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// The feed ran out of data
    Completed,
    /// Stop requested by a user, the strategy or the orchestration layer
    Requested(String),
    /// A fatal error ended the run
    Failed(String),
}

impl StopReason {
    pub fn requested(reason: impl Into<String>) -> Self {
        StopReason::Requested(reason.into())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::Requested(reason) => write!(f, "stop requested: {}", reason),
            StopReason::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}
