//! Shared workflow model types for Cadence.
//!
//! This crate contains the immutable value types exchanged with the
//! scheduling core: Step, WorkflowDefinition, Action, WorkflowExecutionResult,
//! the structured error payload, and engine configuration.
//!
//! No behavior beyond normalization helpers -- only serde, chrono, thiserror.

pub mod action;
pub mod config;
pub mod error;
pub mod execution;
pub mod workflow;
