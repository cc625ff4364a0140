//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides the listening port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{env}: invalid port {0:?}", env = PORT_ENV)]
    Port(String),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => ServiceConfig::default(),
    };

    let port = std::env::var(PORT_ENV).ok();
    let config = apply_port_override(config, port.as_deref())?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML document. Missing sections and fields take their defaults.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Bind to `0.0.0.0:<port>` when a port is given. Empty values are ignored.
pub fn apply_port_override(
    mut config: ServiceConfig,
    port: Option<&str>,
) -> Result<ServiceConfig, ConfigError> {
    if let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) {
        let port: u16 = port.parse().map_err(|_| ConfigError::Port(port.to_string()))?;
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.formatter.style, "LLVM");
        assert_eq!(config.formatter.deadline_secs, 30);
        assert_eq!(config.http.health_path, "/_ah/health");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
[formatter]
program = "/opt/llvm/bin/clang-format"
deadline_secs = 5

[observability]
log_format = "json"

[security]
max_body_bytes = 1048576
"#,
        )
        .unwrap();

        assert_eq!(config.formatter.program.to_str(), Some("/opt/llvm/bin/clang-format"));
        assert_eq!(config.formatter.deadline_secs, 5);
        assert_eq!(config.formatter.style, "LLVM");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.security.max_body_bytes, Some(1_048_576));
        assert!(config.retry_budget.enabled);
    }

    #[test]
    fn unknown_log_format_is_a_parse_error() {
        let err = parse_config("[observability]\nlog_format = \"xml\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn port_override_rebinds_listener() {
        let config = apply_port_override(ServiceConfig::default(), Some("9000")).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");

        let config = apply_port_override(ServiceConfig::default(), Some("")).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");

        let config = apply_port_override(ServiceConfig::default(), None).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = apply_port_override(ServiceConfig::default(), Some("http")).unwrap_err();
        assert!(matches!(err, ConfigError::Port(p) if p == "http"));

        let err = apply_port_override(ServiceConfig::default(), Some("70000")).unwrap_err();
        assert!(matches!(err, ConfigError::Port(_)));
    }

    #[test]
    fn load_config_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("format-relay.toml");

        fs::write(&path, "[formatter]\ndeadline_secs = 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("deadline_secs"));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(load_config(Some(&missing)), Err(ConfigError::Io(_))));
    }

    #[test]
    fn sample_config_matches_defaults() {
        let sample = include_str!("../../config/format-relay.toml");
        let config = parse_config(sample).unwrap();
        let defaults = ServiceConfig::default();
        assert_eq!(
            toml::to_string(&config).unwrap(),
            toml::to_string(&defaults).unwrap()
        );
    }
}
