use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed error taxonomy.
///
/// Declaration order matches validation precedence: when several classes are
/// present, only the one with the lowest `precedence()` is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or invalid fields.
    Structural,
    /// A `depends_on` target does not exist.
    DependencyReference,
    /// The dependency graph contains a cycle.
    Cycle,
    /// Non-serializable payload or invalid timeout.
    ActionConstruction,
    /// A reserved or future execution mode was requested.
    UnsupportedExecutionMode,
    /// A reserved field attempted to influence a decision.
    ReservedFieldSemanticUse,
    /// The definition changed between validation and execution.
    ContractIntegrityViolation,
}

impl ErrorCode {
    /// 1 = highest. The integrity code is outside validation ordering.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Structural => 1,
            Self::DependencyReference => 2,
            Self::Cycle => 3,
            Self::ActionConstruction => 4,
            Self::UnsupportedExecutionMode => 5,
            Self::ReservedFieldSemanticUse => 6,
            Self::ContractIntegrityViolation => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Structural => "STRUCTURAL",
            Self::DependencyReference => "DEPENDENCY_REFERENCE",
            Self::Cycle => "CYCLE",
            Self::ActionConstruction => "ACTION_CONSTRUCTION",
            Self::UnsupportedExecutionMode => "UNSUPPORTED_EXECUTION_MODE",
            Self::ReservedFieldSemanticUse => "RESERVED_FIELD_SEMANTIC_USE",
            Self::ContractIntegrityViolation => "CONTRACT_INTEGRITY_VIOLATION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Structured error payload carried by every raised or recorded error.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct WorkflowError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub context: ErrorContext,
    /// ISO-8601 creation time. Informational only.
    pub timestamp: DateTime<Utc>,
}

impl WorkflowError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Structural, message)
    }

    pub fn dependency_reference(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DependencyReference, message)
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cycle, message)
    }

    pub fn action_construction(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ActionConstruction, message)
    }

    pub fn unsupported_execution_mode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedExecutionMode, message)
    }

    pub fn reserved_field_semantic_use(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReservedFieldSemanticUse, message)
    }

    pub fn integrity_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ContractIntegrityViolation, message)
    }

    pub fn with_workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.context.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.context.step_id = Some(step_id.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_follows_declaration_order() {
        let mut codes = vec![
            ErrorCode::ReservedFieldSemanticUse,
            ErrorCode::Cycle,
            ErrorCode::Structural,
            ErrorCode::UnsupportedExecutionMode,
            ErrorCode::DependencyReference,
            ErrorCode::ActionConstruction,
        ];
        codes.sort();
        let ranks: Vec<u8> = codes.iter().map(|c| c.precedence()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_workflow_error_display_and_context() {
        let err = WorkflowError::dependency_reference("step 'b' depends on unknown step 'zz'")
            .with_workflow("wf-1")
            .with_step("b")
            .with_field("depends_on");
        assert_eq!(
            err.to_string(),
            "[DEPENDENCY_REFERENCE] step 'b' depends on unknown step 'zz'"
        );
        assert_eq!(err.context.step_id.as_deref(), Some("b"));
        assert_eq!(err.context.field.as_deref(), Some("depends_on"));
    }

    #[test]
    fn test_workflow_error_serializes_iso_timestamp() {
        let err = WorkflowError::cycle("cycle detected involving step 'a'");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "CYCLE");
        let ts = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "got: {ts}");
        // Empty context fields are omitted.
        assert_eq!(json["context"], serde_json::json!({}));
    }
}
