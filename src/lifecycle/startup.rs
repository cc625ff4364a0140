//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the formatter, retry budget and sampler
//! - Hand everything to the server as one `AppContext`
//!
//! # Design Decisions
//! - Fail fast: an invalid config is fatal
//! - A missing formatter executable is only a warning; health checks must
//!   keep passing and format requests report the launch failure
//! - The listener is bound by the caller, after `prepare` succeeded

use std::sync::Arc;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::{validation::validate_config, ServiceConfig, ValidationError};
use crate::format::{FormatCommand, Formatter};
use crate::observability::tracing::Sampler;
use crate::resilience::RetryBudget;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Config(Vec<ValidationError>),

    #[error("docs_url is not a valid header value: {0}")]
    DocsLocation(String),
}

/// Collaborators resolved at startup and injected into the server.
pub struct AppContext {
    pub config: ServiceConfig,
    pub formatter: Arc<dyn Formatter>,
    pub budget: Option<Arc<RetryBudget>>,
    pub sampler: Option<Arc<Sampler>>,
    pub docs_location: HeaderValue,
}

/// Validate `config` and build the application context.
pub fn prepare(config: ServiceConfig) -> Result<AppContext, StartupError> {
    validate_config(&config).map_err(StartupError::Config)?;

    let command = FormatCommand::from_config(&config.formatter);
    if !command.program().is_file() {
        tracing::warn!(
            program = %command.program().display(),
            "Formatter executable not found; format requests will fail"
        );
    }
    tracing::info!(
        program = %command.program().display(),
        args = ?command.args(),
        deadline_secs = config.formatter.deadline_secs,
        "Formatter configured"
    );

    let budget = config
        .retry_budget
        .enabled
        .then(|| Arc::new(RetryBudget::from_config(&config.retry_budget)));
    let sampler = config
        .tracing
        .enabled
        .then(|| Arc::new(Sampler::from_config(&config.tracing)));

    let docs_location = HeaderValue::from_str(&config.http.docs_url)
        .map_err(|_| StartupError::DocsLocation(config.http.docs_url.clone()))?;

    Ok(AppContext {
        config,
        formatter: Arc::new(command),
        budget,
        sampler,
        docs_location,
    })
}
