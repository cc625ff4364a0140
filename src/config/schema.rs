//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the formatting service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// External formatter invocation.
    pub formatter: FormatterConfig,

    /// HTTP surface (documentation redirect, health path).
    pub http: HttpConfig,

    /// Retry budget admission control.
    pub retry_budget: RetryBudgetConfig,

    /// Request span sampling.
    pub tracing: TraceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Formatter process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Path to the formatting executable.
    pub program: PathBuf,

    /// Extra arguments placed before the style flag.
    pub args: Vec<String>,

    /// Style name, passed as `-style=<style>`.
    pub style: String,

    /// Ceiling on a single formatter run, in seconds.
    pub deadline_secs: u64,

    /// Maximum stderr bytes kept for the failure message.
    pub stderr_limit_bytes: usize,

    /// Output buffered before the response status is committed.
    pub commit_threshold_bytes: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/clang-format"),
            args: Vec::new(),
            style: "LLVM".to_string(),
            deadline_secs: 30,
            stderr_limit_bytes: 64 * 1024,
            commit_threshold_bytes: 1024 * 1024,
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Where non-POST requests to `/` are redirected.
    pub docs_url: String,

    /// Liveness probe path.
    pub health_path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            docs_url: "https://clang.llvm.org/docs/ClangFormat.html".to_string(),
            health_path: "/_ah/health".to_string(),
        }
    }
}

/// Retry budget configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryBudgetConfig {
    /// Enable the budget in front of the formatter route.
    pub enabled: bool,

    /// Retries per second that are always allowed.
    pub rate: f64,

    /// Fraction of requests that can be retries.
    /// e.g., 0.1 for 10% budget.
    pub ratio: f64,

    /// Sliding window length in seconds.
    pub window_secs: u64,
}

impl Default for RetryBudgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 2.0,
            ratio: 0.1,
            window_secs: 10,
        }
    }
}

/// Request span sampling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Enable per-request spans.
    pub enabled: bool,

    /// Probability that a request is sampled.
    pub fraction: f64,

    /// Upper bound on sampled requests per second.
    pub max_per_second: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fraction: 1.0,
            max_per_second: 5.0,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes. Unlimited when unset.
    pub max_body_bytes: Option<usize>,
}
