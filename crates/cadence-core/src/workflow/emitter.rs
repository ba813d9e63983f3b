//! Action emission: step -> immutable `Action` records.
//!
//! The emitter owns the only per-invocation lookup state (declaration
//! indices and the step -> action-ID map). It is built fresh for every
//! execution and dropped with it.

use std::collections::HashMap;

use cadence_types::action::{Action, ActionMetadata, Routing};
use cadence_types::error::WorkflowError;
use cadence_types::workflow::Step;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use super::validate::{STEP_PRIORITY_MAX, STEP_PRIORITY_MIN};

/// Inclusive bounds of the action priority.
pub const ACTION_PRIORITY_MIN: u8 = 1;
pub const ACTION_PRIORITY_MAX: u8 = 10;

// ---------------------------------------------------------------------------
// Priority clamp
// ---------------------------------------------------------------------------

/// Scale a step priority (`1..=1000`) linearly onto the action range (`1..=10`).
///
/// Rounds up, so 1000 -> 10, 500 -> 5, 50 -> 1. Out-of-range inputs are
/// clamped to the step range first.
pub fn clamp_priority(step_priority: i64) -> u8 {
    let p = step_priority.clamp(STEP_PRIORITY_MIN, STEP_PRIORITY_MAX);
    let max = i64::from(ACTION_PRIORITY_MAX);
    let scaled = (p * max + STEP_PRIORITY_MAX - 1) / STEP_PRIORITY_MAX;
    u8::try_from(scaled.clamp(i64::from(ACTION_PRIORITY_MIN), max)).unwrap_or(ACTION_PRIORITY_MAX)
}

/// Build an action ID: `{workflow_id}:{step_id}:{sequence}`.
pub fn action_id(workflow_id: &str, step_id: &str, sequence: u32) -> String {
    format!("{workflow_id}:{step_id}:{sequence}")
}

// ---------------------------------------------------------------------------
// Payload checks
// ---------------------------------------------------------------------------

/// Nesting depth of a JSON value (scalars are depth 0).
fn json_depth(value: &Value) -> usize {
    let mut max = 0;
    let mut stack = vec![(value, 0usize)];
    while let Some((v, depth)) = stack.pop() {
        max = max.max(depth);
        match v {
            Value::Array(items) => stack.extend(items.iter().map(|i| (i, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|i| (i, depth + 1))),
            _ => {}
        }
    }
    max
}

/// Check that a payload is a plain JSON object a consumer can parse back.
fn validate_payload(payload: &Value, max_depth: usize) -> Result<(), String> {
    if !payload.is_object() {
        return Err("payload must be a JSON object".to_string());
    }
    let depth = json_depth(payload);
    if depth > max_depth {
        return Err(format!(
            "payload nesting depth {depth} exceeds the maximum of {max_depth}"
        ));
    }
    serde_json::to_vec(payload)
        .map(|_| ())
        .map_err(|e| format!("payload is not serializable: {e}"))
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Caller-supplied values copied into every action unchanged.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassThrough<'a> {
    pub lease_id: Option<&'a str>,
    pub epoch: u64,
    pub created_at: DateTime<Utc>,
    pub max_payload_depth: usize,
}

pub(crate) struct ActionEmitter<'a> {
    workflow_id: &'a str,
    pass_through: PassThrough<'a>,
    declaration_index: HashMap<&'a str, usize>,
    emitted: HashMap<&'a str, Vec<String>>,
    sequences: HashMap<&'a str, u32>,
}

impl<'a> ActionEmitter<'a> {
    pub fn new(workflow_id: &'a str, steps: &'a [Step], pass_through: PassThrough<'a>) -> Self {
        let mut declaration_index = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            declaration_index.entry(step.step_id.as_str()).or_insert(i);
        }
        Self {
            workflow_id,
            pass_through,
            declaration_index,
            emitted: HashMap::new(),
            sequences: HashMap::new(),
        }
    }

    /// Emit the action(s) for one step.
    ///
    /// All checks run before anything is recorded, so a failure leaves the
    /// actions of earlier steps untouched.
    pub fn emit(&mut self, step: &'a Step) -> Result<Vec<Action>, WorkflowError> {
        let workflow_id = self.workflow_id;
        let step_id = step.step_id.as_str();
        let fail = |message: String, field: &str| {
            WorkflowError::action_construction(message)
                .with_workflow(workflow_id)
                .with_step(step_id)
                .with_field(field)
        };

        let step_type = step.normalized_type().ok_or_else(|| {
            WorkflowError::structural(format!(
                "step '{step_id}' has unknown step_type '{}'",
                step.step_type
            ))
            .with_workflow(self.workflow_id)
            .with_step(step_id)
            .with_field("step_type")
        })?;
        let routing = Routing::for_step_type(step_type);

        let timeout_ms = u64::try_from(step.timeout_ms)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| {
                fail(
                    format!("step '{step_id}' timeout_ms must be positive, got {}", step.timeout_ms),
                    "timeout_ms",
                )
            })?;

        let parameters = step
            .payload
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        if !parameters.is_object() {
            return Err(fail(
                format!("step '{step_id}' payload must be a JSON object"),
                "payload",
            ));
        }
        let payload = json!({
            "workflow_id": self.workflow_id,
            "step_id": step_id,
            "step_name": step.step_name,
            "step_type": step_type.as_str(),
            "parameters": parameters,
        });
        validate_payload(&payload, self.pass_through.max_payload_depth)
            .map_err(|reason| fail(format!("step '{step_id}': {reason}"), "payload"))?;

        let dependencies = self.remap_dependencies(step).map_err(|dep| {
            fail(
                format!("step '{step_id}' depends on '{dep}', which has no emitted action"),
                "depends_on",
            )
        })?;

        let correlation_id = step
            .correlation_id
            .clone()
            .unwrap_or_else(|| format!("{}:{step_id}", self.workflow_id));

        let sequence = self.sequences.get(step_id).copied().unwrap_or(0);
        let action = Action {
            action_id: action_id(self.workflow_id, step_id, sequence),
            action_type: routing.action_type,
            target_node_type: routing.target_node_type,
            payload,
            dependencies,
            priority: clamp_priority(step.priority),
            timeout_ms,
            lease_id: self.pass_through.lease_id.map(str::to_string),
            epoch: self.pass_through.epoch,
            retry_count: step.retry_count,
            metadata: ActionMetadata {
                step_name: step.step_name.clone(),
                correlation_id,
                error_action: step.error_action,
                routing_hint: routing.hint.map(str::to_string),
            },
            created_at: self.pass_through.created_at,
        };

        self.sequences.insert(step_id, sequence + 1);
        self.emitted
            .entry(step_id)
            .or_default()
            .push(action.action_id.clone());

        tracing::debug!(
            action_id = action.action_id.as_str(),
            action_type = ?action.action_type,
            priority = action.priority,
            dependencies = action.dependencies.len(),
            "emitted action"
        );

        Ok(vec![action])
    }

    /// Map `depends_on` step IDs to the action IDs those steps emitted.
    ///
    /// Dependencies are visited in declaration order (not `depends_on` order),
    /// deduplicated. Returns the first dependency with nothing emitted.
    fn remap_dependencies(&self, step: &Step) -> Result<Vec<String>, &'a str> {
        let mut deps: Vec<(usize, &'a str)> = Vec::with_capacity(step.depends_on.len());
        for dep in &step.depends_on {
            let Some((&id, &idx)) = self.declaration_index.get_key_value(dep.as_str()) else {
                continue;
            };
            deps.push((idx, id));
        }
        deps.sort_unstable();
        deps.dedup();

        let mut out = Vec::new();
        for (_, dep) in deps {
            match self.emitted.get(dep) {
                Some(ids) if !ids.is_empty() => out.extend(ids.iter().cloned()),
                _ => return Err(dep),
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
