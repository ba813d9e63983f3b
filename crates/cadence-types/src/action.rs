//! Action types: the immutable work commands the engine emits.
//!
//! An `Action` is what an external router dispatches to a worker node. Its
//! identifier and position in the emitted list are a pure function of the
//! workflow ID and the definition content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{ErrorAction, StepType};

/// The command kind carried by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Compute,
    Effect,
    Reduce,
    Orchestrate,
    Custom,
}

/// The worker node kind an action is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetNodeType {
    ComputeNode,
    EffectNode,
    ReducerNode,
    OrchestratorNode,
    CustomNode,
}

/// Routing entry for one step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub action_type: ActionType,
    pub target_node_type: TargetNodeType,
    /// Extra routing hint recorded in action metadata (`parallel` only).
    pub hint: Option<&'static str>,
}

impl Routing {
    /// Exhaustive step type -> routing table.
    pub const fn for_step_type(step_type: StepType) -> Self {
        let (action_type, target_node_type, hint) = match step_type {
            StepType::Compute => (ActionType::Compute, TargetNodeType::ComputeNode, None),
            StepType::Effect => (ActionType::Effect, TargetNodeType::EffectNode, None),
            StepType::Reducer => (ActionType::Reduce, TargetNodeType::ReducerNode, None),
            StepType::Orchestrator => (
                ActionType::Orchestrate,
                TargetNodeType::OrchestratorNode,
                None,
            ),
            StepType::Custom => (ActionType::Custom, TargetNodeType::CustomNode, None),
            // Not a distinct action type: compute work carrying a routing hint.
            StepType::Parallel => (
                ActionType::Compute,
                TargetNodeType::ComputeNode,
                Some("parallel"),
            ),
        };
        Self {
            action_type,
            target_node_type,
            hint,
        }
    }
}

/// Descriptive metadata copied from the originating step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub step_name: String,
    pub correlation_id: String,
    pub error_action: ErrorAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_hint: Option<String>,
}

/// An immutable, deterministically identified work command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// `{workflow_id}:{step_id}:{sequence}`.
    pub action_id: String,
    pub action_type: ActionType,
    pub target_node_type: TargetNodeType,
    /// Plain JSON object, validated before emission.
    pub payload: serde_json::Value,
    /// Action IDs (never step IDs) that must complete first.
    pub dependencies: Vec<String>,
    /// Clamped into `1..=10`.
    pub priority: u8,
    pub timeout_ms: u64,
    /// Opaque ownership token supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    /// Opaque optimistic-concurrency counter supplied by the caller.
    pub epoch: u64,
    pub retry_count: u32,
    pub metadata: ActionMetadata,
    /// Informational only; never compared for ordering.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_table_is_exhaustive() {
        let routes: Vec<_> = StepType::ALL.into_iter().map(Routing::for_step_type).collect();
        assert_eq!(routes[0].action_type, ActionType::Compute);
        assert_eq!(routes[1].target_node_type, TargetNodeType::EffectNode);
        assert_eq!(routes[2].action_type, ActionType::Reduce);
        assert_eq!(routes[3].action_type, ActionType::Orchestrate);
        assert_eq!(routes[4].target_node_type, TargetNodeType::CustomNode);
        assert!(routes[..5].iter().all(|r| r.hint.is_none()));
    }

    #[test]
    fn test_parallel_is_a_routing_hint_not_an_action_type() {
        let route = Routing::for_step_type(StepType::Parallel);
        assert_eq!(route.action_type, ActionType::Compute);
        assert_eq!(route.target_node_type, TargetNodeType::ComputeNode);
        assert_eq!(route.hint, Some("parallel"));
    }

    #[test]
    fn test_action_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ActionType::Orchestrate).unwrap(),
            "\"ORCHESTRATE\""
        );
        assert_eq!(
            serde_json::to_string(&TargetNodeType::ReducerNode).unwrap(),
            "\"reducer_node\""
        );
    }
}
