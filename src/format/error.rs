//! Formatter failure classification.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Why a formatter run did not produce output.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The deadline elapsed; the process was killed.
    #[error("formatting timed out after {0:?}")]
    Timeout(Duration),

    /// The executable could not be started.
    #[error("{program}: failed to launch: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process exited non-zero or was killed by a signal.
    #[error("{program}: {status}\nSTDERR: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Reading the request body failed.
    #[error("reading request body: {0}")]
    Input(#[source] io::Error),

    /// Writing output towards the caller failed.
    #[error("writing formatted output: {0}")]
    Transport(#[source] io::Error),

    /// A pipe to the child process broke.
    #[error("formatter pipe: {0}")]
    Io(#[source] io::Error),
}

/// Coarse result of one formatting request, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    BadInput,
    Disconnected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::BadInput => "bad_input",
            Outcome::Disconnected => "disconnected",
        }
    }
}

impl FormatError {
    pub fn outcome(&self) -> Outcome {
        match self {
            FormatError::Timeout(_) => Outcome::Timeout,
            FormatError::Launch { .. } | FormatError::Failed { .. } | FormatError::Io(_) => {
                Outcome::Failure
            }
            FormatError::Input(_) => Outcome::BadInput,
            FormatError::Transport(_) => Outcome::Disconnected,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FormatError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        let timeout = FormatError::Timeout(Duration::from_secs(1));
        assert_eq!(timeout.outcome(), Outcome::Timeout);
        assert!(timeout.is_timeout());

        let input = FormatError::Input(io::Error::other("reset"));
        assert_eq!(input.outcome().as_str(), "bad_input");

        let launch = FormatError::Launch {
            program: "clang-format".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(launch.outcome(), Outcome::Failure);
        assert!(launch.to_string().starts_with("clang-format: failed to launch"));
    }
}
