//! Workflow executor: validated, wave-ordered action emission.
//!
//! `execute_workflow` is the single entry point. It is synchronous and keeps
//! no state between calls: every lookup table is built inside the call and
//! dropped with it.
//!
//! # Execution flow
//!
//! 1. Phase 1 validation; any error is raised before anything is emitted.
//! 2. Seal the contract with an integrity hash.
//! 3. Empty step lists complete immediately.
//! 4. Compute waves and walk the steps in wave order.
//! 5. Per step: skip disabled steps and steps with an unavailable dependency,
//!    otherwise emit its action; classify emission failures by `error_action`.
//! 6. Verify the integrity hash, then assemble the result.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use cadence_types::action::Action;
use cadence_types::config::EngineConfig;
use cadence_types::error::{ErrorCode, WorkflowError};
use cadence_types::execution::{ExecutionStatus, WorkflowExecutionResult};
use cadence_types::workflow::{ErrorAction, ExecutionMode, Step, WorkflowDefinition};
use chrono::Utc;
use serde_json::{Value, json};

use super::dag::{compute_waves, flatten_waves};
use super::emitter::{ActionEmitter, PassThrough};
use super::integrity::IntegrityGuard;
use super::validate::{validate_phase_one, validate_steps};

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Caller-supplied inputs for one invocation.
///
/// `lease_id` and `epoch` come from the external ownership layer and are
/// copied into every action as-is; this engine never mints or checks them.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub lease_id: Option<String>,
    /// Zero for new workflows.
    pub epoch: u64,
    /// Advisory override of the definition's execution-mode hint.
    pub execution_mode: Option<ExecutionMode>,
    pub config: EngineConfig,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lease(mut self, lease_id: impl Into<String>, epoch: u64) -> Self {
        self.lease_id = Some(lease_id.into());
        self.epoch = epoch;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

// ---------------------------------------------------------------------------
// ExecutorError
// ---------------------------------------------------------------------------

/// Errors raised by `execute_workflow`.
///
/// Per-step emission failures are not raised; they land in the result.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Phase 1 validation failed. Holds every error of the highest class.
    #[error("workflow validation failed with {} {code} error(s): {}", .errors.len(), first_message(.errors))]
    Validation {
        code: ErrorCode,
        errors: Vec<WorkflowError>,
    },

    /// The contract changed between validation and result assembly.
    #[error("{0}")]
    Integrity(WorkflowError),
}

fn first_message(errors: &[WorkflowError]) -> &str {
    errors.first().map(|e| e.message.as_str()).unwrap_or_default()
}

impl ExecutorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::Integrity(err) => err.code,
        }
    }

    pub fn errors(&self) -> &[WorkflowError] {
        match self {
            Self::Validation { errors, .. } => errors,
            Self::Integrity(err) => std::slice::from_ref(err),
        }
    }

    /// Wrap a non-empty, single-class validation result.
    fn validation(workflow_id: Option<&str>, errors: Vec<WorkflowError>) -> Option<Self> {
        let code = errors.first()?.code;
        let errors = errors
            .into_iter()
            .map(|e| match workflow_id {
                Some(id) => e.with_workflow(id),
                None => e,
            })
            .collect();
        Some(Self::Validation { code, errors })
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Execute a workflow: validate, schedule, and emit actions.
pub fn execute_workflow(
    definition: &WorkflowDefinition,
    steps: &[Step],
    workflow_id: &str,
    ctx: &ExecutionContext,
) -> Result<WorkflowExecutionResult, ExecutorError> {
    let errors = validate_phase_one(definition, steps, requested_mode(definition, ctx));
    if let Some(err) = ExecutorError::validation(Some(workflow_id), errors) {
        tracing::warn!(
            workflow_id,
            code = %err.code(),
            errors = err.errors().len(),
            "workflow rejected by validation"
        );
        return Err(err);
    }

    let guard = IntegrityGuard::seal(definition, steps)
        .map_err(|e| ExecutorError::Integrity(e.with_workflow(workflow_id)))?;

    run_sealed(definition, steps, workflow_id, ctx, &guard)
}

/// Non-blocking wrapper for async callers. The work itself stays synchronous
/// and never yields mid-execution.
pub async fn execute_workflow_async(
    definition: &WorkflowDefinition,
    steps: &[Step],
    workflow_id: &str,
    ctx: &ExecutionContext,
) -> Result<WorkflowExecutionResult, ExecutorError> {
    execute_workflow(definition, steps, workflow_id, ctx)
}

/// Step IDs in the order their actions would be emitted.
pub fn get_execution_order(steps: &[Step]) -> Result<Vec<String>, ExecutorError> {
    if let Some(err) = ExecutorError::validation(None, validate_steps(steps)) {
        return Err(err);
    }
    let waves = compute_waves(steps).map_err(|e| ExecutorError::Validation {
        code: e.code,
        errors: vec![e],
    })?;
    Ok(flatten_waves(waves)
        .into_iter()
        .map(|s| s.step_id.clone())
        .collect())
}

// ---------------------------------------------------------------------------
// Execution mode
// ---------------------------------------------------------------------------

/// Mode the validator must check beyond the definition's own hint.
fn requested_mode(definition: &WorkflowDefinition, ctx: &ExecutionContext) -> Option<ExecutionMode> {
    match (ctx.execution_mode, &definition.workflow_metadata.execution_mode) {
        (Some(mode), _) => Some(mode),
        (None, Some(_)) => None,
        (None, None) => Some(ctx.config.default_execution_mode),
    }
}

/// Override, else definition hint, else configured default. Advisory only.
fn effective_mode(definition: &WorkflowDefinition, ctx: &ExecutionContext) -> ExecutionMode {
    ctx.execution_mode
        .or_else(|| {
            definition
                .workflow_metadata
                .execution_mode
                .as_deref()
                .and_then(ExecutionMode::normalize)
        })
        .unwrap_or(ctx.config.default_execution_mode)
}

// ---------------------------------------------------------------------------
// Sealed execution
// ---------------------------------------------------------------------------

/// Per-step bookkeeping for one invocation.
#[derive(Default)]
struct StepOutcomes<'a> {
    completed: Vec<String>,
    failed: Vec<String>,
    disabled: Vec<usize>,
    dependency_skipped: Vec<usize>,
    stopped: Vec<usize>,
    /// Failed or skipped step IDs; dependents of these are skipped.
    unavailable: HashSet<&'a str>,
    actions: Vec<Action>,
    errors: Vec<WorkflowError>,
    retry_hints: BTreeMap<String, u32>,
}

impl StepOutcomes<'_> {
    /// Disabled, then dependency-skipped, then stop-skipped; each group in
    /// declaration order.
    fn skipped_steps(&mut self, steps: &[Step]) -> Vec<String> {
        let mut out = Vec::new();
        for group in [
            &mut self.disabled,
            &mut self.dependency_skipped,
            &mut self.stopped,
        ] {
            group.sort_unstable();
            out.extend(group.iter().map(|&i| steps[i].step_id.clone()));
        }
        out
    }
}

pub(crate) fn run_sealed(
    definition: &WorkflowDefinition,
    steps: &[Step],
    workflow_id: &str,
    ctx: &ExecutionContext,
    guard: &IntegrityGuard,
) -> Result<WorkflowExecutionResult, ExecutorError> {
    let started = Instant::now();
    let mode = effective_mode(definition, ctx);
    let mut status = advance(workflow_id, ExecutionStatus::Pending, ExecutionStatus::Running);

    tracing::info!(
        workflow_id,
        steps = steps.len(),
        mode = %mode,
        "workflow execution started"
    );

    let mut metadata = BTreeMap::new();
    metadata.insert("integrity_hash".to_string(), json!(guard.hash()));
    metadata.insert("execution_mode".to_string(), json!(mode.as_str()));
    metadata.insert(
        "failure_strategy".to_string(),
        serde_json::to_value(definition.coordination_rules.failure_strategy)
            .unwrap_or(Value::Null),
    );

    if steps.is_empty() {
        status = advance(workflow_id, status, ExecutionStatus::Completed);
        return Ok(WorkflowExecutionResult {
            workflow_id: workflow_id.to_string(),
            execution_status: status,
            completed_steps: vec![],
            failed_steps: vec![],
            skipped_steps: vec![],
            actions_emitted: vec![],
            execution_time_ms: elapsed_ms(started),
            errors: vec![],
            metadata,
        });
    }

    let waves = compute_waves(steps).map_err(|e| ExecutorError::Validation {
        code: e.code,
        errors: vec![e.with_workflow(workflow_id)],
    })?;
    tracing::debug!(workflow_id, waves = waves.len(), "computed execution waves");
    let ordered = flatten_waves(waves);

    let declaration_index: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.step_id.as_str(), i))
        .collect();

    let mut emitter = ActionEmitter::new(
        workflow_id,
        steps,
        PassThrough {
            lease_id: ctx.lease_id.as_deref(),
            epoch: ctx.epoch,
            created_at: Utc::now(),
            max_payload_depth: ctx.config.max_payload_depth,
        },
    );

    let mut outcomes = StepOutcomes::default();
    let mut halted = false;

    for step in ordered {
        let id = step.step_id.as_str();
        let idx = declaration_index.get(id).copied().unwrap_or_default();

        if halted {
            if step.enabled {
                outcomes.stopped.push(idx);
            } else {
                outcomes.disabled.push(idx);
            }
            continue;
        }

        if !step.enabled {
            tracing::debug!(workflow_id, step_id = id, "skipping disabled step");
            outcomes.disabled.push(idx);
            outcomes.unavailable.insert(id);
            continue;
        }

        if let Some(dep) = step
            .depends_on
            .iter()
            .find(|d| outcomes.unavailable.contains(d.as_str()))
        {
            tracing::debug!(
                workflow_id,
                step_id = id,
                dependency = dep.as_str(),
                "skipping step with unavailable dependency"
            );
            outcomes.dependency_skipped.push(idx);
            outcomes.unavailable.insert(id);
            continue;
        }

        match emitter.emit(step) {
            Ok(actions) => {
                outcomes.completed.push(step.step_id.clone());
                outcomes.actions.extend(actions);
            }
            Err(err) => {
                tracing::warn!(
                    workflow_id,
                    step_id = id,
                    error_action = ?step.error_action,
                    error = %err,
                    "action construction failed"
                );
                outcomes.failed.push(step.step_id.clone());
                outcomes.unavailable.insert(id);
                outcomes.errors.push(err);
                match step.error_action {
                    ErrorAction::Stop => halted = true,
                    ErrorAction::Continue => {}
                    ErrorAction::Retry => {
                        outcomes
                            .retry_hints
                            .insert(step.step_id.clone(), step.retry_count);
                    }
                }
            }
        }
    }

    guard
        .verify(definition, steps)
        .map_err(|e| ExecutorError::Integrity(e.with_workflow(workflow_id)))?;

    if !outcomes.retry_hints.is_empty() {
        metadata.insert("retry_hints".to_string(), json!(&outcomes.retry_hints));
    }

    let next = if outcomes.failed.is_empty() {
        ExecutionStatus::Completed
    } else {
        ExecutionStatus::Failed
    };
    status = advance(workflow_id, status, next);

    let skipped_steps = outcomes.skipped_steps(steps);
    let result = WorkflowExecutionResult {
        workflow_id: workflow_id.to_string(),
        execution_status: status,
        completed_steps: outcomes.completed,
        failed_steps: outcomes.failed,
        skipped_steps,
        actions_emitted: outcomes.actions,
        execution_time_ms: elapsed_ms(started),
        errors: outcomes.errors,
        metadata,
    };

    tracing::info!(
        workflow_id,
        status = ?result.execution_status,
        completed = result.completed_steps.len(),
        failed = result.failed_steps.len(),
        skipped = result.skipped_steps.len(),
        actions = result.actions_emitted.len(),
        "workflow execution finished"
    );

    Ok(result)
}

fn advance(workflow_id: &str, from: ExecutionStatus, to: ExecutionStatus) -> ExecutionStatus {
    debug_assert!(from.can_transition_to(to), "illegal transition {from:?} -> {to:?}");
    tracing::debug!(workflow_id, ?from, ?to, "execution status changed");
    to
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
