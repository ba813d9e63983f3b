//! Workflow contract types for Cadence.
//!
//! `WorkflowDefinition` and `Step` are the already-parsed contract the engine
//! consumes. They are built once by an external loader and never mutated.
//! String-typed fields (`step_type`, `execution_mode`) are kept raw so the
//! validator can normalize them and report precise structural errors instead
//! of the loader failing on the first unknown value.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Forward-compatible extension fields.
///
/// Parsed and preserved verbatim (they feed the integrity hash and round-trip
/// through serialization) but never read by any scheduling decision.
pub type ReservedFields = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Step type
// ---------------------------------------------------------------------------

/// The kind of step, which decides where its action is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Compute,
    Effect,
    Reducer,
    Orchestrator,
    Custom,
    /// Routing metadata only. Never a concurrency signal.
    Parallel,
}

impl StepType {
    pub const ALL: [Self; 6] = [
        Self::Compute,
        Self::Effect,
        Self::Reducer,
        Self::Orchestrator,
        Self::Custom,
        Self::Parallel,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Effect => "effect",
            Self::Reducer => "reducer",
            Self::Orchestrator => "orchestrator",
            Self::Custom => "custom",
            Self::Parallel => "parallel",
        }
    }

    /// Normalize a raw contract value (trimmed, lowercased) into a step type.
    ///
    /// Returns `None` for anything outside the fixed enumeration; there is no
    /// silent default.
    pub fn normalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized.as_str())
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error action
// ---------------------------------------------------------------------------

/// What the executor does when a step's action cannot be constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Halt all further step processing.
    #[default]
    Stop,
    /// Mark the step failed and keep going.
    Continue,
    /// Mark the step failed and record a retry hint for the dispatcher.
    Retry,
}

// ---------------------------------------------------------------------------
// Execution mode
// ---------------------------------------------------------------------------

/// Advisory execution-mode hint.
///
/// `Conditional` and `Streaming` are reserved for future revisions and are
/// rejected by the validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
    Batch,
    Conditional,
    Streaming,
}

impl ExecutionMode {
    pub const ALL: [Self; 5] = [
        Self::Sequential,
        Self::Parallel,
        Self::Batch,
        Self::Conditional,
        Self::Streaming,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Batch => "batch",
            Self::Conditional => "conditional",
            Self::Streaming => "streaming",
        }
    }

    /// Whether this mode is reserved (parsed, but not executable in v1).
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Conditional | Self::Streaming)
    }

    pub fn normalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized.as_str())
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single declared unit of work in the workflow DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Canonical key. Unique within a workflow, never derived from the name.
    pub step_id: String,
    /// Display name. Duplicates are legal.
    pub step_name: String,
    /// Raw step type; normalized against [`StepType`] during validation.
    pub step_type: String,
    /// Step IDs this step depends on. Semantically a set.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Advisory priority in `1..=1000`.
    #[serde(default = "default_priority")]
    pub priority: i64,
    /// Must be positive; checked when the action is constructed.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,
    #[serde(default)]
    pub error_action: ErrorAction,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Defaults to `{workflow_id}:{step_id}` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Step input forwarded into the action payload. Must be a JSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reserved: ReservedFields,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> i64 {
    100
}

fn default_timeout_ms() -> i64 {
    30_000
}

fn default_retry_count() -> u32 {
    3
}

impl Step {
    /// Build a step with contract defaults for every optional field.
    pub fn new(
        step_id: impl Into<String>,
        step_name: impl Into<String>,
        step_type: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            step_type: step_type.into(),
            depends_on: Vec::new(),
            enabled: default_enabled(),
            priority: default_priority(),
            timeout_ms: default_timeout_ms(),
            error_action: ErrorAction::default(),
            retry_count: default_retry_count(),
            correlation_id: None,
            payload: None,
            reserved: ReservedFields::new(),
        }
    }

    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_error_action(mut self, error_action: ErrorAction) -> Self {
        self.error_action = error_action;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_reserved(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.reserved.insert(key.into(), value);
        self
    }

    /// The normalized step type, if the raw value is in the enumeration.
    pub fn normalized_type(&self) -> Option<StepType> {
        StepType::normalize(&self.step_type)
    }
}

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// Name, version and advisory hints describing a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub workflow_name: String,
    /// Semantic version string (e.g. "1.0.0").
    pub workflow_version: String,
    /// Advisory hint; never alters wave computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reserved: ReservedFields,
}

impl WorkflowMetadata {
    pub fn new(workflow_name: impl Into<String>, workflow_version: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            workflow_version: workflow_version.into(),
            execution_mode: None,
            description: None,
            reserved: ReservedFields::new(),
        }
    }
}

/// Workflow-wide failure handling hint. Recorded, never acted upon here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    #[default]
    FailFast,
    ContinueOnError,
    Retry,
}

/// Coordination hints consumed by external dispatchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationRules {
    #[serde(default)]
    pub failure_strategy: FailureStrategy,
    #[serde(default = "default_parallel_execution_allowed")]
    pub parallel_execution_allowed: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reserved: ReservedFields,
}

fn default_parallel_execution_allowed() -> bool {
    true
}

impl Default for CoordinationRules {
    fn default() -> Self {
        Self {
            failure_strategy: FailureStrategy::default(),
            parallel_execution_allowed: default_parallel_execution_allowed(),
            reserved: ReservedFields::new(),
        }
    }
}

/// The canonical, immutable workflow contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Contract schema version (semantic version string).
    pub version: String,
    pub workflow_metadata: WorkflowMetadata,
    /// Declared steps in authoritative declaration order. May be left empty
    /// when the loader hands the step collection over separately.
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub coordination_rules: CoordinationRules,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reserved: ReservedFields,
}

impl WorkflowDefinition {
    pub fn new(version: impl Into<String>, workflow_metadata: WorkflowMetadata) -> Self {
        Self {
            version: version.into(),
            workflow_metadata,
            steps: Vec::new(),
            coordination_rules: CoordinationRules::default(),
            reserved: ReservedFields::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_definition() -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new("1.0.0", WorkflowMetadata::new("ingest", "1.2.0"));
        def.workflow_metadata.execution_mode = Some("parallel".to_string());
        def.steps = vec![
            Step::new("fetch", "Fetch", "effect").with_payload(json!({"url": "s3://bucket"})),
            Step::new("parse", "Parse", "compute")
                .with_depends_on(["fetch"])
                .with_reserved("x-owner", json!("data-team")),
        ];
        def.reserved.insert("x-future".to_string(), json!({"flag": true}));
        def
    }

    // -----------------------------------------------------------------------
    // Normalization
    // -----------------------------------------------------------------------

    #[test]
    fn test_step_type_normalize_is_case_and_whitespace_insensitive() {
        assert_eq!(StepType::normalize("Compute"), Some(StepType::Compute));
        assert_eq!(StepType::normalize("  REDUCER "), Some(StepType::Reducer));
        assert_eq!(StepType::normalize("parallel"), Some(StepType::Parallel));
        assert_eq!(StepType::normalize("transform"), None);
        assert_eq!(StepType::normalize(""), None);
    }

    #[test]
    fn test_execution_mode_reserved() {
        assert!(!ExecutionMode::Sequential.is_reserved());
        assert!(!ExecutionMode::Batch.is_reserved());
        assert!(ExecutionMode::Conditional.is_reserved());
        assert!(ExecutionMode::Streaming.is_reserved());
        assert_eq!(ExecutionMode::normalize("Streaming"), Some(ExecutionMode::Streaming));
        assert_eq!(ExecutionMode::normalize("eventual"), None);
    }

    // -----------------------------------------------------------------------
    // Defaults
    // -----------------------------------------------------------------------

    #[test]
    fn test_step_defaults_from_minimal_json() {
        let step: Step = serde_json::from_value(json!({
            "step_id": "a",
            "step_name": "A",
            "step_type": "compute"
        }))
        .unwrap();
        assert!(step.enabled);
        assert_eq!(step.priority, 100);
        assert_eq!(step.timeout_ms, 30_000);
        assert_eq!(step.retry_count, 3);
        assert_eq!(step.error_action, ErrorAction::Stop);
        assert!(step.depends_on.is_empty());
        assert!(step.reserved.is_empty());
    }

    // -----------------------------------------------------------------------
    // Round-trips (reserved fields survive verbatim)
    // -----------------------------------------------------------------------

    #[test]
    fn test_definition_yaml_roundtrip_preserves_reserved() {
        let original = sample_definition();
        let yaml = serde_yaml_ng::to_string(&original).expect("serialize to YAML");
        assert!(yaml.contains("x-owner"));
        assert!(yaml.contains("x-future"));

        let parsed: WorkflowDefinition = serde_yaml_ng::from_str(&yaml).expect("parse YAML");
        assert_eq!(parsed, original);
        assert_eq!(parsed.steps[1].reserved["x-owner"], json!("data-team"));
    }

    #[test]
    fn test_parse_realistic_yaml_contract() {
        let yaml = r#"
version: "1.0.0"
workflow_metadata:
  workflow_name: nightly-rollup
  workflow_version: "2.1.0"
  execution_mode: sequential
coordination_rules:
  failure_strategy: continue_on_error
steps:
  - step_id: load
    step_name: Load
    step_type: effect
  - step_id: sum
    step_name: Sum
    step_type: Reducer
    depends_on: [load]
    priority: 900
    error_action: retry
    retry_count: 5
"#;
        let def: WorkflowDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(def.workflow_metadata.workflow_name, "nightly-rollup");
        assert_eq!(
            def.coordination_rules.failure_strategy,
            FailureStrategy::ContinueOnError
        );
        assert!(def.coordination_rules.parallel_execution_allowed);
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.steps[1].normalized_type(), Some(StepType::Reducer));
        assert_eq!(def.steps[1].error_action, ErrorAction::Retry);
        assert_eq!(def.steps[1].depends_on, vec!["load"]);
    }
}
