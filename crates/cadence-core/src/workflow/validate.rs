//! Phase 1 (static) workflow validation.
//!
//! Collects every violation in a fixed walk order (definition first, then
//! steps in declaration order) and reports only the highest-priority error
//! class present:
//!
//! 1. structural
//! 2. dependency reference
//! 3. cycle
//! 4. action construction (Phase 2, raised by the emitter)
//! 5. unsupported execution mode
//! 6. reserved-field semantic use
//!
//! Lower classes stay hidden until every higher class is fixed, so repeated
//! fix iterations see a stable remediation order.

use std::collections::{HashMap, HashSet};

use cadence_types::error::WorkflowError;
use cadence_types::workflow::{
    ExecutionMode, ReservedFields, Step, StepType, WorkflowDefinition,
};

use super::dag::StepGraph;

/// Inclusive bounds of the advisory step priority.
pub const STEP_PRIORITY_MIN: i64 = 1;
pub const STEP_PRIORITY_MAX: i64 = 1000;

/// Field names a reserved entry may not shadow.
///
/// A reserved key matching one of these (after normalization) is an attempt
/// to steer validation, ordering, action shape, or failure classification.
const SEMANTIC_FIELD_NAMES: &[&str] = &[
    "action_id",
    "correlation_id",
    "dependencies",
    "depends_on",
    "enabled",
    "epoch",
    "error_action",
    "execution_mode",
    "execution_order",
    "failure_strategy",
    "lease_id",
    "order",
    "parallel_execution_allowed",
    "payload",
    "priority",
    "retry_count",
    "sequence",
    "step_id",
    "step_name",
    "step_type",
    "steps",
    "target_node_type",
    "timeout_ms",
    "version",
    "wave",
    "workflow_name",
    "workflow_version",
];

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Validate a definition and its steps.
///
/// Returns an empty list when the workflow is valid; otherwise every error of
/// the single highest-priority class, in walk order.
pub fn validate_workflow(definition: &WorkflowDefinition, steps: &[Step]) -> Vec<WorkflowError> {
    validate_phase_one(definition, steps, None)
}

/// Validate a bare step collection (no definition-level checks).
pub fn validate_steps(steps: &[Step]) -> Vec<WorkflowError> {
    let mut errors = Vec::new();
    check_steps(steps, &mut errors);
    highest_priority_class(errors)
}

/// Phase 1 with an optional caller-requested execution mode.
pub(crate) fn validate_phase_one(
    definition: &WorkflowDefinition,
    steps: &[Step],
    requested_mode: Option<ExecutionMode>,
) -> Vec<WorkflowError> {
    let mut errors = Vec::new();
    check_definition(definition, steps, requested_mode, &mut errors);
    check_steps(steps, &mut errors);
    highest_priority_class(errors)
}

/// Keep only the errors of the highest-priority class, preserving order.
pub(crate) fn highest_priority_class(errors: Vec<WorkflowError>) -> Vec<WorkflowError> {
    let Some(top) = errors.iter().map(|e| e.code.precedence()).min() else {
        return errors;
    };
    errors
        .into_iter()
        .filter(|e| e.code.precedence() == top)
        .collect()
}

// ---------------------------------------------------------------------------
// Definition-level checks
// ---------------------------------------------------------------------------

fn check_definition(
    definition: &WorkflowDefinition,
    steps: &[Step],
    requested_mode: Option<ExecutionMode>,
    errors: &mut Vec<WorkflowError>,
) {
    if let Err(e) = semver::Version::parse(definition.version.trim()) {
        errors.push(
            WorkflowError::structural(format!(
                "contract version '{}' is not a semantic version: {e}",
                definition.version
            ))
            .with_field("version"),
        );
    }

    let meta = &definition.workflow_metadata;
    if meta.workflow_name.trim().is_empty() {
        errors.push(
            WorkflowError::structural("workflow name must not be empty")
                .with_field("workflow_metadata.workflow_name"),
        );
    }
    if let Err(e) = semver::Version::parse(meta.workflow_version.trim()) {
        errors.push(
            WorkflowError::structural(format!(
                "workflow version '{}' is not a semantic version: {e}",
                meta.workflow_version
            ))
            .with_field("workflow_metadata.workflow_version"),
        );
    }

    if let Some(raw) = &meta.execution_mode {
        match ExecutionMode::normalize(raw) {
            None => errors.push(
                WorkflowError::structural(format!("unknown execution mode '{raw}'"))
                    .with_field("workflow_metadata.execution_mode"),
            ),
            Some(mode) if mode.is_reserved() => errors.push(
                WorkflowError::unsupported_execution_mode(format!(
                    "execution mode '{mode}' is reserved and not supported"
                ))
                .with_field("workflow_metadata.execution_mode"),
            ),
            Some(_) => {}
        }
    }
    if let Some(mode) = requested_mode.filter(|m| m.is_reserved()) {
        errors.push(
            WorkflowError::unsupported_execution_mode(format!(
                "requested execution mode '{mode}' is reserved and not supported"
            ))
            .with_field("execution_mode"),
        );
    }

    if !definition.steps.is_empty() && definition.steps.as_slice() != steps {
        errors.push(
            WorkflowError::structural(
                "step collection does not match the steps declared by the definition",
            )
            .with_field("steps"),
        );
    }

    check_reserved(&definition.reserved, "reserved", None, errors);
    check_reserved(&meta.reserved, "workflow_metadata.reserved", None, errors);
    check_reserved(
        &definition.coordination_rules.reserved,
        "coordination_rules.reserved",
        None,
        errors,
    );
}

// ---------------------------------------------------------------------------
// Step-level checks
// ---------------------------------------------------------------------------

/// Step-level checks in precedence order: structural, dependency references,
/// cycles, reserved fields.
///
/// A cycle that coexists with a dangling `depends_on` target is reported as
/// a dependency-reference error, because that class ranks higher. The cycle
/// surfaces as `CYCLE` once every reference resolves, and from then on it
/// outranks execution-mode and reserved-field errors.
fn check_steps(steps: &[Step], errors: &mut Vec<WorkflowError>) {
    let mut first_seen: HashMap<&str, usize> = HashMap::with_capacity(steps.len());

    // Structural
    for (idx, step) in steps.iter().enumerate() {
        let id = step.step_id.as_str();
        if id.trim().is_empty() {
            errors.push(
                WorkflowError::structural(format!("step at position {idx} has an empty step_id"))
                    .with_field("step_id"),
            );
        } else if let Some(first) = first_seen.get(id) {
            errors.push(
                WorkflowError::structural(format!(
                    "duplicate step_id '{id}' (first declared at position {first})"
                ))
                .with_step(id)
                .with_field("step_id"),
            );
        } else {
            first_seen.insert(id, idx);
        }

        if step.step_name.trim().is_empty() {
            errors.push(
                WorkflowError::structural(format!("step '{id}' has an empty step_name"))
                    .with_step(id)
                    .with_field("step_name"),
            );
        }

        if StepType::normalize(&step.step_type).is_none() {
            errors.push(
                WorkflowError::structural(format!(
                    "step '{id}' has unknown step_type '{}'",
                    step.step_type
                ))
                .with_step(id)
                .with_field("step_type"),
            );
        }

        if !(STEP_PRIORITY_MIN..=STEP_PRIORITY_MAX).contains(&step.priority) {
            errors.push(
                WorkflowError::structural(format!(
                    "step '{id}' priority {} is outside {STEP_PRIORITY_MIN}..={STEP_PRIORITY_MAX}",
                    step.priority
                ))
                .with_step(id)
                .with_field("priority"),
            );
        }
    }

    // Dependency references
    let known: HashSet<&str> = steps.iter().map(|s| s.step_id.as_str()).collect();
    for step in steps {
        for dep in &step.depends_on {
            if !known.contains(dep.as_str()) {
                errors.push(
                    WorkflowError::dependency_reference(format!(
                        "step '{}' depends on unknown step '{dep}'",
                        step.step_id
                    ))
                    .with_step(step.step_id.as_str())
                    .with_field("depends_on"),
                );
            }
        }
    }

    // Cycles
    for path in StepGraph::build(steps).find_cycles() {
        let first = path.first().copied().unwrap_or_default();
        errors.push(
            WorkflowError::cycle(format!("cycle detected: {}", path.join(" -> ")))
                .with_step(first)
                .with_field("depends_on"),
        );
    }

    // Reserved fields
    for step in steps {
        check_reserved(&step.reserved, "reserved", Some(&step.step_id), errors);
    }
}

/// Flag reserved entries that shadow a decision-bearing field.
///
/// This is the only place reserved content is looked at, and it only looks at
/// keys: values are never inspected.
fn check_reserved(
    reserved: &ReservedFields,
    location: &str,
    step_id: Option<&str>,
    errors: &mut Vec<WorkflowError>,
) {
    for key in reserved.keys() {
        let normalized = key.trim().to_ascii_lowercase().replace('-', "_");
        if SEMANTIC_FIELD_NAMES.contains(&normalized.as_str()) {
            let mut err = WorkflowError::reserved_field_semantic_use(format!(
                "reserved field '{key}' shadows semantic field '{normalized}'"
            ))
            .with_field(format!("{location}.{key}"));
            if let Some(id) = step_id {
                err = err.with_step(id);
            }
            errors.push(err);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
