//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (deadline, limits, sampling fractions)
//! - Validate addresses and URLs before anything binds or redirects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// Longest deadline a formatter run may be given.
pub const MAX_DEADLINE_SECS: u64 = 300;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("formatter.deadline_secs must be between 1 and {max}, got {0}", max = MAX_DEADLINE_SECS)]
    DeadlineOutOfRange(u64),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("http.docs_url: {0}")]
    InvalidDocsUrl(String),

    #[error("http.health_path must start with '/' and must not be '/', got {0:?}")]
    InvalidHealthPath(String),

    #[error("{field} must be within [0, 1], got {value}")]
    NotAFraction { field: &'static str, value: f64 },

    #[error("{field} must be a finite non-negative number, got {value}")]
    NegativeRate { field: &'static str, value: f64 },
}

/// Validate the configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let formatter = &config.formatter;
    if formatter.program.as_os_str().is_empty() {
        errors.push(ValidationError::Empty("formatter.program"));
    }
    if formatter.style.trim().is_empty() {
        errors.push(ValidationError::Empty("formatter.style"));
    }
    if formatter.deadline_secs == 0 || formatter.deadline_secs > MAX_DEADLINE_SECS {
        errors.push(ValidationError::DeadlineOutOfRange(formatter.deadline_secs));
    }
    if formatter.stderr_limit_bytes == 0 {
        errors.push(ValidationError::Zero("formatter.stderr_limit_bytes"));
    }
    if formatter.commit_threshold_bytes == 0 {
        errors.push(ValidationError::Zero("formatter.commit_threshold_bytes"));
    }

    match Url::parse(&config.http.docs_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::InvalidDocsUrl(format!(
            "unsupported scheme {:?}",
            url.scheme()
        ))),
        Err(e) => errors.push(ValidationError::InvalidDocsUrl(e.to_string())),
    }

    let health = &config.http.health_path;
    if !health.starts_with('/') || health == "/" {
        errors.push(ValidationError::InvalidHealthPath(health.clone()));
    }

    let budget = &config.retry_budget;
    if budget.enabled {
        check_rate(&mut errors, "retry_budget.rate", budget.rate);
        check_fraction(&mut errors, "retry_budget.ratio", budget.ratio);
        if budget.window_secs == 0 {
            errors.push(ValidationError::Zero("retry_budget.window_secs"));
        }
    }

    let tracing = &config.tracing;
    if tracing.enabled {
        check_fraction(&mut errors, "tracing.fraction", tracing.fraction);
        check_rate(&mut errors, "tracing.max_per_second", tracing.max_per_second);
    }

    if config.security.max_body_bytes == Some(0) {
        errors.push(ValidationError::Zero("security.max_body_bytes"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_fraction(errors: &mut Vec<ValidationError>, field: &'static str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::NotAFraction { field, value });
    }
}

fn check_rate(errors: &mut Vec<ValidationError>, field: &'static str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        errors.push(ValidationError::NegativeRate { field, value });
    }
}
