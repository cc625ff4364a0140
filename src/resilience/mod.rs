//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Server side, request to `/`:
//!     → retries.rs (retry budget: admit or 429)
//!     → formatter handler
//!
//! Client side (format-cli):
//!     → backoff.rs (space out retries, mark them with Retry-Attempt)
//! ```
//!
//! # Design Decisions
//! - Every formatter run has a deadline (enforced in `format::command`)
//! - The service never retries a run itself; clients retry whole requests
//! - Retry budget keeps client retries from amplifying an overload

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{is_retry, retry_budget_middleware, RetryBudget, RETRY_ATTEMPT};
