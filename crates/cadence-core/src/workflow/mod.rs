//! Workflow scheduling core: validation, wave computation, and action emission.
//!
//! - `validate` -- Phase 1 checks and single-class error precedence
//! - `dag` -- dependency graph, cycle detection, deterministic wave ordering
//! - `emitter` -- per-step action construction and dependency remapping
//! - `integrity` -- canonical hashing and the seal/verify guard
//! - `executor` -- the `execute_workflow` entry point

mod dag;
pub mod emitter;
pub mod executor;
pub mod integrity;
pub mod validate;

pub use emitter::{action_id, clamp_priority};
pub use executor::{
    ExecutionContext, ExecutorError, execute_workflow, execute_workflow_async, get_execution_order,
};
pub use integrity::{IntegrityGuard, compute_workflow_hash};
pub use validate::{validate_steps, validate_workflow};
