//! Request handlers.
//!
//! # Responsibilities
//! - Redirect non-POST requests on the formatting route to the docs
//! - Stream the request body through the formatter
//! - Answer health checks

use std::io;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{FutureExt, TryStreamExt};
use tokio::time::Instant;
use tokio_util::io::StreamReader;
use tracing::{Instrument, Span};

use crate::format::FormatJob;
use crate::http::response::{self, FormatRelay};
use crate::http::server::AppState;
use crate::observability::tracing::Sampled;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Formatting endpoint. POST bodies are formatted, anything else is
/// redirected to the documentation.
pub async fn format_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    if request.method() != Method::POST {
        tracing::debug!(method = %request.method(), "Redirecting to documentation");
        return (
            StatusCode::FOUND,
            [(header::LOCATION, state.docs_location.clone())],
        )
            .into_response();
    }

    let deadline = Instant::now() + state.deadline;
    let sampled = request
        .extensions()
        .get::<Sampled>()
        .is_some_and(|s| s.0);

    let body = request.into_body().into_data_stream().map_err(io::Error::other);
    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
    let job = FormatJob {
        input: Box::pin(StreamReader::new(body)),
        output: Box::pin(writer),
        deadline,
    };

    let span = if sampled {
        tracing::info_span!("formatter", program = %state.formatter.name())
    } else {
        Span::none()
    };
    let run = state.formatter.format(job).instrument(span).boxed();

    let settled = FormatRelay::new(run, reader)
        .settle(state.commit_threshold)
        .await;
    response::into_response(settled)
}

/// Liveness probe. Never touches the formatter.
pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FormatError, FormatFuture, Formatter};
    use crate::http::server::{router, Layers};
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    enum Behavior {
        Uppercase,
        Hang,
        Fail,
    }

    struct RecordingFormatter {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl RecordingFormatter {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Formatter for RecordingFormatter {
        fn name(&self) -> &str {
            "recording"
        }

        fn format(&self, mut job: FormatJob) -> FormatFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Uppercase => Box::pin(async move {
                    let mut input = Vec::new();
                    job.input.read_to_end(&mut input).await.map_err(FormatError::Input)?;
                    job.output
                        .write_all(&input.to_ascii_uppercase())
                        .await
                        .map_err(FormatError::Transport)?;
                    Ok(())
                }),
                Behavior::Hang => Box::pin(async move {
                    tokio::time::sleep_until(job.deadline).await;
                    Err(FormatError::Timeout(Duration::from_millis(50)))
                }),
                Behavior::Fail => Box::pin(async move {
                    Err(FormatError::Io(io::Error::other("exit status: 1")))
                }),
            }
        }
    }

    fn app(formatter: &Arc<RecordingFormatter>) -> axum::Router {
        let state = AppState {
            formatter: formatter.clone(),
            deadline: Duration::from_millis(50),
            commit_threshold: 1024,
            docs_location: HeaderValue::from_static("https://example.com/docs"),
        };
        router(state, "/_ah/health", Layers::default())
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn get_redirects_without_running_formatter() {
        let formatter = RecordingFormatter::new(Behavior::Uppercase);
        let app = app(&formatter);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://example.com/docs"
        );
        assert_eq!(formatter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn post_returns_formatted_body() {
        let formatter = RecordingFormatter::new(Behavior::Uppercase);
        let app = app(&formatter);

        let response = app
            .oneshot(Request::post("/").body(Body::from("int x;")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_text(response).await, "INT X;");
        assert_eq!(formatter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_maps_to_408() {
        let formatter = RecordingFormatter::new(Behavior::Hang);
        let app = app(&formatter);

        let response = app
            .oneshot(Request::post("/").body(Body::from("x")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body_text(response).await, "request timed out");
    }

    #[tokio::test]
    async fn failure_maps_to_500() {
        let formatter = RecordingFormatter::new(Behavior::Fail);
        let app = app(&formatter);

        let response = app
            .oneshot(Request::post("/").body(Body::from("x")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("exit status: 1"));
    }

    #[tokio::test]
    async fn health_and_unknown_paths() {
        let formatter = RecordingFormatter::new(Behavior::Fail);
        let app = app(&formatter);

        let response = app
            .clone()
            .oneshot(Request::get("/_ah/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");

        let response = app
            .oneshot(Request::post("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(formatter.calls.load(Ordering::SeqCst), 0);
    }
}
