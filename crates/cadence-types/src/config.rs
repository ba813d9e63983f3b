//! Engine configuration types.
//!
//! `EngineConfig` is usually parsed from TOML by
//! `cadence_core::config::parse_engine_config`. Every field has a default.

use serde::{Deserialize, Serialize};

use crate::workflow::ExecutionMode;

/// Tunables for the scheduling core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum JSON nesting depth of an action payload. Deeper payloads
    /// cannot be parsed back by a standard JSON consumer.
    #[serde(default = "default_max_payload_depth")]
    pub max_payload_depth: usize,

    /// Mode used when neither the caller nor the definition names one.
    #[serde(default)]
    pub default_execution_mode: ExecutionMode,
}

fn default_max_payload_depth() -> usize {
    128
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_payload_depth: default_max_payload_depth(),
            default_execution_mode: ExecutionMode::default(),
        }
    }
}
