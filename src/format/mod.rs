//! Formatting subsystem.
//!
//! # Data Flow
//! ```text
//! request body (AsyncRead)
//!     → command.rs (spawn formatter, feed stdin)
//!     → stdout relayed into the job's output (AsyncWrite)
//!     → stderr captured into a bounded buffer
//!     → exit status / deadline → Result<(), FormatError>
//! ```
//!
//! # Design Decisions
//! - One process per request, never reused
//! - The deadline is enforced by the implementation that owns the process
//! - Every return path kills the process (kill-on-drop plus explicit reap)

pub mod command;
pub mod error;

use std::pin::Pin;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

pub use command::FormatCommand;
pub use error::{FormatError, Outcome};

/// Document source for one formatting run.
pub type FormatInput = Pin<Box<dyn AsyncRead + Send>>;

/// Destination for formatted bytes.
pub type FormatOutput = Pin<Box<dyn AsyncWrite + Send>>;

/// Pending formatter run. Dropping it cancels the run.
pub type FormatFuture = BoxFuture<'static, Result<(), FormatError>>;

/// Everything one formatting run needs.
pub struct FormatJob {
    pub input: FormatInput,
    pub output: FormatOutput,
    pub deadline: Instant,
}

/// A transformation from source text to formatted text.
pub trait Formatter: Send + Sync {
    /// Name used in logs, spans and error messages.
    fn name(&self) -> &str;

    /// Start a run. The returned future owns all resources of the run.
    fn format(&self, job: FormatJob) -> FormatFuture;
}
