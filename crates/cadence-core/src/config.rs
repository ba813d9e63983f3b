//! Engine configuration loader.
//!
//! Reads an optional `cadence.toml` and deserializes it into
//! [`EngineConfig`]. Missing or malformed files fall back to defaults, and
//! values the engine cannot honor are replaced with a warning.

use std::path::Path;

use cadence_types::config::EngineConfig;
use cadence_types::workflow::ExecutionMode;

/// File name looked up by [`load_engine_config`].
pub const CONFIG_FILE_NAME: &str = "cadence.toml";

/// Parse engine configuration from TOML text.
///
/// - Parse failures log a warning and return [`EngineConfig::default()`].
/// - A reserved `default_execution_mode` is replaced with `sequential`.
/// - A zero `max_payload_depth` is replaced with the default.
pub fn parse_engine_config(content: &str) -> EngineConfig {
    match toml::from_str::<EngineConfig>(content) {
        Ok(config) => sanitize(config),
        Err(err) => {
            tracing::warn!("Failed to parse engine config: {err}, using defaults");
            EngineConfig::default()
        }
    }
}

/// Load engine configuration from `{dir}/cadence.toml`.
pub fn load_engine_config(dir: &Path) -> EngineConfig {
    let config_path = dir.join(CONFIG_FILE_NAME);

    match std::fs::read_to_string(&config_path) {
        Ok(content) => parse_engine_config(&content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            EngineConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            EngineConfig::default()
        }
    }
}

fn sanitize(mut config: EngineConfig) -> EngineConfig {
    if config.default_execution_mode.is_reserved() {
        tracing::warn!(
            mode = %config.default_execution_mode,
            "default_execution_mode is reserved, falling back to sequential"
        );
        config.default_execution_mode = ExecutionMode::Sequential;
    }
    if config.max_payload_depth == 0 {
        let fallback = EngineConfig::default().max_payload_depth;
        tracing::warn!(fallback, "max_payload_depth must be positive, using default");
        config.max_payload_depth = fallback;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_empty_returns_default() {
        assert_eq!(parse_engine_config(""), EngineConfig::default());
    }

    #[test]
    fn parse_valid_toml() {
        let config = parse_engine_config(
            r#"
max_payload_depth = 32
default_execution_mode = "parallel"
"#,
        );
        assert_eq!(config.max_payload_depth, 32);
        assert_eq!(config.default_execution_mode, ExecutionMode::Parallel);
    }

    #[test]
    fn parse_invalid_toml_returns_default() {
        let config = parse_engine_config("max_payload_depth = [this is not valid");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn parse_unknown_mode_returns_default() {
        let config = parse_engine_config(r#"default_execution_mode = "turbo""#);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn reserved_mode_falls_back_to_sequential() {
        let config = parse_engine_config(r#"default_execution_mode = "streaming""#);
        assert_eq!(config.default_execution_mode, ExecutionMode::Sequential);
    }

    #[test]
    fn zero_depth_falls_back_to_default() {
        let config = parse_engine_config("max_payload_depth = 0");
        assert_eq!(config.max_payload_depth, 128);
    }

    #[test]
    fn load_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_engine_config(tmp.path()), EngineConfig::default());
    }

    #[test]
    fn load_reads_file_from_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "default_execution_mode = \"batch\"\n",
        )
        .unwrap();
        let config = load_engine_config(tmp.path());
        assert_eq!(config.default_execution_mode, ExecutionMode::Batch);
        assert_eq!(config.max_payload_depth, 128);
    }
}
