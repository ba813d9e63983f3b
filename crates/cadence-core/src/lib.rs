//! Deterministic workflow scheduling for Cadence.
//!
//! Given a workflow definition and its steps, this crate validates the
//! contract, orders steps into dependency waves, and emits one action per
//! step for an external dispatcher. It performs no I/O during execution and
//! never runs the actions it emits.

pub mod config;
pub mod workflow;
