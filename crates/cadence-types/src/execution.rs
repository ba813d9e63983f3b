//! Execution result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::WorkflowError;

/// Lifecycle of one execution.
///
/// `Pending -> Running -> {Completed | Failed | Cancelled}`. Terminal states
/// have no outbound transitions. The engine never originates `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running),
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }
}

/// Outcome of a single `execute` invocation. Built fresh, never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub workflow_id: String,
    pub execution_status: ExecutionStatus,
    /// Step IDs whose action was emitted, in emission order.
    pub completed_steps: Vec<String>,
    /// Step IDs whose action could not be constructed, in processing order.
    pub failed_steps: Vec<String>,
    /// Disabled, then dependency-skipped, then stop-skipped; each group in
    /// declaration order.
    pub skipped_steps: Vec<String>,
    pub actions_emitted: Vec<Action>,
    pub execution_time_ms: u64,
    /// Per-step action-construction failures (recorded, not raised).
    #[serde(default)]
    pub errors: Vec<WorkflowError>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}
