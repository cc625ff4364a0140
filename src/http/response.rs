//! Response construction for formatter runs.
//!
//! # Responsibilities
//! - Relay formatter output to the client while the run is still going
//! - Pick the status code from the run outcome when it is known in time
//! - Map formatter errors to HTTP status codes
//!
//! # Design Decisions
//! - Output is buffered up to a commit threshold; a run that finishes before
//!   the threshold gets its exact status (200/408/500)
//! - Past the threshold the status is committed as 200 and the rest streams;
//!   a later failure aborts the body instead of switching status
//! - The run is spawned on its own task so its deadline fires even when the
//!   client stops reading the body
//! - The relay holds an abort-on-drop handle, so dropping the response (client
//!   gone) aborts the run and kills the formatter

use std::io;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, Stream, StreamExt};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::task::JoinError;
use tokio_util::task::AbortOnDropHandle;

use crate::format::{FormatError, FormatFuture, Outcome};
use crate::observability::metrics;

const READ_CHUNK: usize = 16 * 1024;

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

impl IntoResponse for FormatError {
    fn into_response(self) -> Response {
        let status = match &self {
            FormatError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            FormatError::Input(_) => StatusCode::BAD_REQUEST,
            FormatError::Launch { .. }
            | FormatError::Failed { .. }
            | FormatError::Transport(_)
            | FormatError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match &self {
            FormatError::Timeout(_) => "request timed out".to_string(),
            other => other.to_string(),
        };
        (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
    }
}

/// How a run ended, from the caller's point of view.
pub enum Settled {
    /// The run finished before the commit threshold.
    Complete(Result<Bytes, FormatError>),
    /// The threshold was crossed; `head` is ready, `rest` keeps the run going.
    Streaming { head: Bytes, rest: FormatRelay },
}

/// Couples a formatter run with the read side of its output pipe.
pub struct FormatRelay {
    run: AbortOnDropHandle<Result<(), FormatError>>,
    reader: DuplexStream,
    outcome: Option<Result<(), FormatError>>,
    started: Instant,
}

impl FormatRelay {
    /// Spawn `run` and pair it with `reader`. Must be called inside a runtime.
    pub fn new(run: FormatFuture, reader: DuplexStream) -> Self {
        Self {
            run: AbortOnDropHandle::new(tokio::spawn(run)),
            reader,
            outcome: None,
            started: Instant::now(),
        }
    }

    /// Buffer output until the run completes or `threshold` bytes are ready.
    pub async fn settle(mut self, threshold: usize) -> Settled {
        let mut head = BytesMut::new();
        loop {
            head.reserve(READ_CHUNK);
            tokio::select! {
                joined = &mut self.run, if self.outcome.is_none() => {
                    self.outcome = Some(flatten(joined));
                }
                read = self.reader.read_buf(&mut head) => match read {
                    Ok(0) => {
                        let result = self.finish().await.map(|()| head.freeze());
                        return Settled::Complete(result);
                    }
                    Ok(_) if head.len() >= threshold => {
                        return Settled::Streaming { head: head.freeze(), rest: self };
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let error = FormatError::Transport(e);
                        self.report(&Err(&error));
                        return Settled::Complete(Err(error));
                    }
                }
            }
        }
    }

    /// Read the next chunk of output. `None` once the run succeeded.
    async fn next_chunk(&mut self) -> Option<Result<Bytes, FormatError>> {
        let mut chunk = BytesMut::with_capacity(READ_CHUNK);
        loop {
            tokio::select! {
                joined = &mut self.run, if self.outcome.is_none() => {
                    self.outcome = Some(flatten(joined));
                }
                read = self.reader.read_buf(&mut chunk) => match read {
                    Ok(0) => return self.finish().await.err().map(Err),
                    Ok(_) => return Some(Ok(chunk.freeze())),
                    Err(e) => return Some(Err(FormatError::Transport(e))),
                }
            }
        }
    }

    /// Output is exhausted: wait for the run and report its outcome.
    async fn finish(&mut self) -> Result<(), FormatError> {
        let result = match self.outcome.take() {
            Some(result) => result,
            None => flatten((&mut self.run).await),
        };
        self.report(&result.as_ref().map(|_| ()));
        result
    }

    fn report(&self, result: &Result<(), &FormatError>) {
        let elapsed = self.started.elapsed();
        match result {
            Ok(()) => {
                tracing::debug!(elapsed = ?elapsed, "Formatting succeeded");
                metrics::record_format(Outcome::Success, self.started);
            }
            Err(error) => {
                match error.outcome() {
                    Outcome::Disconnected => {
                        tracing::info!(error = %error, "Client went away during formatting")
                    }
                    _ => tracing::warn!(error = %error, elapsed = ?elapsed, "Formatting failed"),
                }
                metrics::record_format(error.outcome(), self.started);
            }
        }
    }

    /// Stream `head` followed by the remaining output. A run failure after
    /// this point surfaces as a body error, which aborts the response.
    pub fn into_stream(self, head: Bytes) -> impl Stream<Item = Result<Bytes, io::Error>> + Send {
        let rest = stream::unfold(Some(self), |state| async move {
            let mut relay = state?;
            match relay.next_chunk().await {
                Some(Ok(chunk)) => Some((Ok(chunk), Some(relay))),
                Some(Err(e)) => Some((Err(io::Error::other(e)), None)),
                None => None,
            }
        });
        stream::once(async move { Ok(head) }).chain(rest)
    }
}

fn flatten(joined: Result<Result<(), FormatError>, JoinError>) -> Result<(), FormatError> {
    joined.unwrap_or_else(|e| Err(FormatError::Io(io::Error::other(e))))
}

/// Turn a settled run into the HTTP response.
pub fn into_response(settled: Settled) -> Response {
    match settled {
        Settled::Complete(Ok(output)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], output).into_response()
        }
        Settled::Complete(Err(error)) => error.into_response(),
        Settled::Streaming { head, rest } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TEXT_PLAIN)],
            Body::from_stream(rest.into_stream(head)),
        )
            .into_response(),
    }
}
