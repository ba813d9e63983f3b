//! Contract integrity: canonical SHA-256 hashing of a validated workflow.
//!
//! The executor seals the definition right after Phase 1 validation and
//! verifies the seal right before returning, so any mutation slipped in
//! between the two is caught. Reserved fields are part of the hash even
//! though execution ignores them.

use cadence_types::error::WorkflowError;
use cadence_types::workflow::{Step, WorkflowDefinition};
use serde_json::Value;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Canonical serialization
// ---------------------------------------------------------------------------

/// Render a JSON value canonically: object keys sorted lexicographically,
/// arrays in declaration order, no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Canonical SHA-256 hash of a definition together with its step collection.
///
/// Lowercase hex SHA-256 over the canonical JSON of
/// `{"definition": ..., "steps": ...}`.
pub fn compute_workflow_hash(
    definition: &WorkflowDefinition,
    steps: &[Step],
) -> Result<String, WorkflowError> {
    let mut document = serde_json::Map::new();
    document.insert(
        "definition".to_string(),
        serde_json::to_value(definition).map_err(canonicalize_error)?,
    );
    document.insert(
        "steps".to_string(),
        serde_json::to_value(steps).map_err(canonicalize_error)?,
    );
    let document = Value::Object(document);
    let digest = Sha256::digest(canonical_json(&document).as_bytes());
    Ok(format!("{digest:x}"))
}

fn canonicalize_error(err: serde_json::Error) -> WorkflowError {
    WorkflowError::integrity_violation(format!("workflow could not be canonicalized: {err}"))
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// A hash taken after validation, checked again before results are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityGuard {
    hash: String,
}

impl IntegrityGuard {
    pub fn seal(definition: &WorkflowDefinition, steps: &[Step]) -> Result<Self, WorkflowError> {
        let hash = compute_workflow_hash(definition, steps)?;
        tracing::debug!(hash = hash.as_str(), "sealed workflow contract");
        Ok(Self { hash })
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Recompute and compare. Any difference is a contract integrity violation.
    pub fn verify(&self, definition: &WorkflowDefinition, steps: &[Step]) -> Result<(), WorkflowError> {
        let actual = compute_workflow_hash(definition, steps)?;
        if actual != self.hash {
            return Err(WorkflowError::integrity_violation(format!(
                "workflow contract changed during execution: expected hash '{}', got '{actual}'",
                self.hash
            )));
        }
        tracing::debug!(hash = actual.as_str(), "verified workflow contract");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::error::ErrorCode;
    use cadence_types::workflow::WorkflowMetadata;
    use serde_json::json;

    fn definition() -> WorkflowDefinition {
        WorkflowDefinition::new("1.0.0", WorkflowMetadata::new("hash-wf", "1.0.0"))
    }

    fn steps() -> Vec<Step> {
        vec![
            Step::new("a", "A", "compute"),
            Step::new("b", "B", "effect").with_depends_on(["a"]),
        ]
    }

    #[test]
    fn test_hash_is_digest_of_canonical_document() {
        let def = definition();
        let document = json!({
            "steps": serde_json::to_value(steps()).unwrap(),
            "definition": serde_json::to_value(&def).unwrap(),
        });
        let expected = format!("{:x}", Sha256::digest(canonical_json(&document).as_bytes()));
        assert_eq!(compute_workflow_hash(&def, &steps()).unwrap(), expected);
    }

    #[test]
    fn test_canonical_json_sorts_keys_and_keeps_array_order() {
        let value = json!({"b": [3, 1, 2], "a": {"z": true, "y": null}, "c": "x"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"y":null,"z":true},"b":[3,1,2],"c":"x"}"#
        );
    }

    #[test]
    fn test_canonical_json_escapes_keys() {
        let value = json!({"quo\"te": 1.5});
        assert_eq!(canonical_json(&value), r#"{"quo\"te":1.5}"#);
    }

    #[test]
    fn test_hash_is_deterministic_and_lowercase_hex() {
        let h1 = compute_workflow_hash(&definition(), &steps()).unwrap();
        let h2 = compute_workflow_hash(&definition(), &steps()).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_covers_reserved_fields() {
        let base = compute_workflow_hash(&definition(), &steps()).unwrap();

        let mut with_step_reserved = steps();
        with_step_reserved[0]
            .reserved
            .insert("x-note".to_string(), json!("hello"));
        assert_ne!(base, compute_workflow_hash(&definition(), &with_step_reserved).unwrap());

        let mut def = definition();
        def.reserved.insert("x-future".to_string(), json!(1));
        assert_ne!(base, compute_workflow_hash(&def, &steps()).unwrap());
    }

    #[test]
    fn test_hash_sensitive_to_step_order() {
        let mut reversed = steps();
        reversed.reverse();
        assert_ne!(
            compute_workflow_hash(&definition(), &steps()).unwrap(),
            compute_workflow_hash(&definition(), &reversed).unwrap()
        );
    }

    #[test]
    fn test_guard_detects_mutation() {
        let def = definition();
        let mut tampered = steps();
        let guard = IntegrityGuard::seal(&def, &tampered).unwrap();
        assert!(guard.verify(&def, &tampered).is_ok());

        tampered[1].priority = 999;
        let err = guard.verify(&def, &tampered).unwrap_err();
        assert_eq!(err.code, ErrorCode::ContractIntegrityViolation);
        assert!(err.message.contains(guard.hash()));
    }
}
