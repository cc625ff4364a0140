//! Retry budget admission control.
//!
//! # Responsibilities
//! - Classify requests as first attempts or retries (`Retry-Attempt` header)
//! - Track requests and retries over a sliding window
//! - Reject retries that exceed the budget before they reach the formatter
//!
//! # Design Decisions
//! - First attempts are never rejected; only retries spend budget
//! - Budget = max(rate * window, ratio * requests), so a quiet service still
//!   allows a trickle of retries
//! - Window is a ring of one-second slots; stale slots are reset lazily
//! - Rejected retries are not counted, so a retry storm cannot grow its own budget

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::RetryBudgetConfig;
use crate::observability::metrics;

/// Header carrying the retry attempt number (0 or absent for first attempts).
pub const RETRY_ATTEMPT: &str = "retry-attempt";

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    second: u64,
    requests: u64,
    retries: u64,
}

/// Sliding-window retry budget shared by all requests.
#[derive(Debug)]
pub struct RetryBudget {
    rate: f64,
    ratio: f64,
    origin: Instant,
    slots: Mutex<Vec<Slot>>,
}

impl RetryBudget {
    pub fn new(rate: f64, ratio: f64, window: Duration) -> Self {
        let len = window.as_secs().max(1) as usize;
        Self {
            rate,
            ratio,
            origin: Instant::now(),
            slots: Mutex::new(vec![Slot::default(); len]),
        }
    }

    pub fn from_config(config: &RetryBudgetConfig) -> Self {
        Self::new(config.rate, config.ratio, Duration::from_secs(config.window_secs))
    }

    /// Record a request and decide whether it may proceed.
    pub fn admit(&self, is_retry: bool) -> bool {
        self.admit_at(Instant::now(), is_retry)
    }

    fn admit_at(&self, now: Instant, is_retry: bool) -> bool {
        let second = now.saturating_duration_since(self.origin).as_secs();
        let mut slots = self.slots.lock().expect("retry budget mutex poisoned");
        let window = slots.len() as u64;

        let (requests, retries) = slots
            .iter()
            .filter(|slot| slot.second + window > second && slot.second <= second)
            .fold((0u64, 0u64), |(req, ret), slot| {
                (req + slot.requests, ret + slot.retries)
            });

        if is_retry {
            let allowed = (self.rate * window as f64).max(self.ratio * (requests + 1) as f64);
            if (retries + 1) as f64 > allowed {
                return false;
            }
        }

        let index = (second % window) as usize;
        let slot = &mut slots[index];
        if slot.second != second {
            *slot = Slot {
                second,
                ..Slot::default()
            };
        }
        slot.requests += 1;
        if is_retry {
            slot.retries += 1;
        }
        true
    }
}

/// Whether the request declares itself a retry.
pub fn is_retry(headers: &HeaderMap) -> bool {
    headers
        .get(RETRY_ATTEMPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok())
        .is_some_and(|attempt| attempt > 0)
}

/// Middleware that rejects retries once the budget is spent.
pub async fn retry_budget_middleware(
    State(budget): State<Arc<RetryBudget>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let retry = is_retry(request.headers());
    if budget.admit(retry) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Retry budget exhausted");
    metrics::record_budget_rejection();
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, HeaderValue::from_static("1"))],
        "retry budget exhausted",
    )
        .into_response()
}
