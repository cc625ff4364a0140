//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the formatting and health routes
//! - Wire up middleware (request ID, sampling, retry budget, body limit)
//! - Serve on a listener until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderValue, middleware, routing::{any, get}, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::format::Formatter;
use crate::http::handler::{format_handler, health};
use crate::http::request::request_id_layer;
use crate::lifecycle::startup::AppContext;
use crate::observability::tracing::{trace_middleware, Sampler};
use crate::resilience::{retry_budget_middleware, RetryBudget};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub formatter: Arc<dyn Formatter>,
    pub deadline: Duration,
    pub commit_threshold: usize,
    pub docs_location: HeaderValue,
}

/// Optional middleware around the routes.
#[derive(Default)]
pub struct Layers {
    pub budget: Option<Arc<RetryBudget>>,
    pub sampler: Option<Arc<Sampler>>,
    pub max_body_bytes: Option<usize>,
}

/// Build the router. The formatting route gets the retry budget (inner)
/// and the sampler (outer); the health route bypasses both.
pub fn router(state: AppState, health_path: &str, layers: Layers) -> Router {
    let Layers {
        budget,
        sampler,
        max_body_bytes,
    } = layers;

    let mut format_route = any(format_handler);
    if let Some(budget) = budget {
        format_route = format_route.layer(middleware::from_fn_with_state(
            budget,
            retry_budget_middleware,
        ));
    }
    if let Some(sampler) = sampler {
        format_route = format_route.layer(middleware::from_fn_with_state(sampler, trace_middleware));
    }

    let mut router = Router::new()
        .route("/", format_route)
        .route(health_path, get(health))
        .with_state(state);
    if let Some(limit) = max_body_bytes {
        router = router.layer(RequestBodyLimitLayer::new(limit));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
}

/// HTTP front end of the formatting service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(context: AppContext) -> Self {
        let AppContext {
            config,
            formatter,
            budget,
            sampler,
            docs_location,
        } = context;

        let state = AppState {
            formatter,
            deadline: Duration::from_secs(config.formatter.deadline_secs),
            commit_threshold: config.formatter.commit_threshold_bytes,
            docs_location,
        };

        let layers = Layers {
            budget,
            sampler,
            max_body_bytes: config.security.max_body_bytes,
        };
        Self {
            router: router(state, &config.http.health_path, layers),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
