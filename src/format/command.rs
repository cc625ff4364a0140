//! Formatter subprocess execution.
//!
//! # Responsibilities
//! - Spawn the formatter with piped stdio
//! - Stream input to stdin and stdout to the caller concurrently
//! - Keep a bounded prefix of stderr for diagnostics
//! - Kill and reap the process when the deadline elapses

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::config::FormatterConfig;
use crate::format::{FormatError, FormatFuture, FormatJob, Formatter};

/// Runs an external formatting executable once per job.
#[derive(Debug, Clone)]
pub struct FormatCommand {
    program: PathBuf,
    args: Vec<String>,
    name: String,
    stderr_limit: usize,
}

impl FormatCommand {
    /// Build from configuration. The style is appended as `-style=<style>`.
    pub fn from_config(config: &FormatterConfig) -> Self {
        let mut args = config.args.clone();
        args.push(format!("-style={}", config.style));

        let name = config
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.program.display().to_string());

        Self {
            program: config.program.clone(),
            args,
            name,
            stderr_limit: config.stderr_limit_bytes,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Formatter for FormatCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, job: FormatJob) -> FormatFuture {
        Box::pin(run(self.command(), self.name.clone(), self.stderr_limit, job))
    }
}

async fn run(
    mut command: Command,
    program: String,
    stderr_limit: usize,
    job: FormatJob,
) -> Result<(), FormatError> {
    let FormatJob {
        mut input,
        mut output,
        deadline,
    } = job;
    let started = Instant::now();

    let mut child = command.spawn().map_err(|source| FormatError::Launch {
        program: program.clone(),
        source,
    })?;
    tracing::debug!(program = %program, pid = ?child.id(), "Formatter spawned");

    let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        terminate(&mut child).await;
        return Err(FormatError::Io(io::Error::other("formatter stdio not captured")));
    };

    let feed = async move {
        match tokio::io::copy(&mut input, &mut stdin).await {
            Ok(_) => {}
            // The formatter stopped reading; its exit status decides the outcome.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Err(e) => return Err(FormatError::Input(e)),
        }
        drop(stdin);
        Ok::<(), FormatError>(())
    };

    let drain = async move {
        tokio::io::copy(&mut stdout, &mut output)
            .await
            .map_err(FormatError::Transport)?;
        output.flush().await.map_err(FormatError::Transport)?;
        Ok::<(), FormatError>(())
    };

    let capture = async move {
        let mut diagnostics = Vec::new();
        (&mut stderr)
            .take(stderr_limit as u64)
            .read_to_end(&mut diagnostics)
            .await
            .map_err(FormatError::Io)?;
        // Discard the rest so the formatter never blocks on a full pipe.
        tokio::io::copy(&mut stderr, &mut tokio::io::sink())
            .await
            .map_err(FormatError::Io)?;
        Ok::<Vec<u8>, FormatError>(diagnostics)
    };

    let io = async {
        let ((), (), diagnostics) = tokio::try_join!(feed, drain, capture)?;
        let status = child.wait().await.map_err(FormatError::Io)?;
        Ok::<(ExitStatus, Vec<u8>), FormatError>((status, diagnostics))
    };

    let result = tokio::time::timeout_at(deadline, io).await;
    match result {
        Ok(Ok((status, _))) if status.success() => {
            tracing::debug!(program = %program, elapsed = ?started.elapsed(), "Formatter finished");
            Ok(())
        }
        Ok(Ok((status, diagnostics))) => Err(FormatError::Failed {
            program,
            status,
            stderr: String::from_utf8_lossy(&diagnostics).into_owned(),
        }),
        Ok(Err(e)) => {
            terminate(&mut child).await;
            Err(e)
        }
        Err(_) => {
            terminate(&mut child).await;
            Err(FormatError::Timeout(deadline.saturating_duration_since(started)))
        }
    }
}

/// Kill the process and wait for it so no zombie outlives the request.
async fn terminate(child: &mut Child) {
    let pid = child.id();
    match child.kill().await {
        Ok(()) => tracing::debug!(pid = ?pid, "Formatter killed"),
        Err(e) => tracing::debug!(pid = ?pid, error = %e, "Formatter already exited"),
    }
}
