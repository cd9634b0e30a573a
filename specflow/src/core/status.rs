//! Persisted pipeline run state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The last known execution state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Registered but not yet executed with its current hash.
    Pending,
    /// Currently executing.
    Running,
    /// Last execution completed successfully.
    Succeeded,
    /// Last execution failed.
    Failed,
    /// The spec carries errors and cannot be executed.
    Invalid,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

impl PipelineState {
    /// Returns true if the state represents a finished execution.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the last execution succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
