//! Request tracing with a limited sampler.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Decide per request whether to record a span (fraction + rate cap)
//! - Create the request span and attach the decision for downstream stages
//!
//! # Design Decisions
//! - An upstream "sampled" flag always wins over local policy
//! - Rate cap is a token bucket so bursts cannot flood the span pipeline
//! - Unsampled requests run with `Span::none()`; no span work is done for them

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use ::tracing::{field, Instrument};

use crate::config::TraceConfig;
use crate::observability::metrics;

/// Google Cloud trace header: `TRACE_ID/SPAN_ID;o=OPTIONS`.
pub const CLOUD_TRACE_CONTEXT: &str = "x-cloud-trace-context";

/// W3C trace header: `VERSION-TRACE_ID-PARENT_ID-FLAGS`.
pub const TRACEPARENT: &str = "traceparent";

/// Trace identity propagated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub parent_id: Option<String>,
    pub sampled: bool,
}

impl TraceContext {
    /// Read the caller's trace context, preferring the W3C header.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        header(TRACEPARENT)
            .and_then(Self::parse_traceparent)
            .or_else(|| header(CLOUD_TRACE_CONTEXT).and_then(Self::parse_cloud))
    }

    fn parse_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let (_version, trace_id, parent_id, flags) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if trace_id.len() != 32 || !is_hex(trace_id) || parent_id.len() != 16 || !is_hex(parent_id) {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;
        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            parent_id: Some(parent_id.to_ascii_lowercase()),
            sampled: flags & 0x01 == 0x01,
        })
    }

    fn parse_cloud(value: &str) -> Option<Self> {
        let (trace_id, rest) = match value.trim().split_once('/') {
            Some((trace_id, rest)) => (trace_id, Some(rest)),
            None => (value.trim(), None),
        };
        if trace_id.is_empty() || !is_hex(trace_id) {
            return None;
        }

        let (parent_id, options) = match rest {
            Some(rest) => match rest.split_once(';') {
                Some((span, options)) => (span, Some(options)),
                None => (rest, None),
            },
            None => ("", None),
        };

        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            parent_id: (!parent_id.is_empty()).then(|| parent_id.to_string()),
            sampled: options.is_some_and(|o| o.trim() == "o=1"),
        })
    }
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Sampling decision attached to the request as an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampled(pub bool);

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Samples a fraction of requests, capped at a maximum rate.
pub struct Sampler {
    fraction: f64,
    max_per_second: f64,
    capacity: f64,
    bucket: Mutex<TokenBucket>,
}

impl Sampler {
    pub fn new(fraction: f64, max_per_second: f64) -> Self {
        let capacity = max_per_second.max(1.0);
        Self {
            fraction,
            max_per_second,
            capacity,
            bucket: Mutex::new(TokenBucket {
                tokens: if max_per_second > 0.0 { capacity } else { 0.0 },
                last_update: Instant::now(),
            }),
        }
    }

    pub fn from_config(config: &TraceConfig) -> Self {
        Self::new(config.fraction, config.max_per_second)
    }

    /// Decide whether to sample. `forced` comes from an upstream sampled flag.
    pub fn sample(&self, forced: bool) -> bool {
        self.sample_at(Instant::now(), forced)
    }

    fn sample_at(&self, now: Instant, forced: bool) -> bool {
        if forced {
            return true;
        }
        if self.fraction <= 0.0 || rand::thread_rng().gen::<f64>() >= self.fraction {
            return false;
        }
        let mut bucket = self.bucket.lock().expect("sampler mutex poisoned");
        bucket.try_acquire(now, self.capacity, self.max_per_second)
    }
}

/// Middleware that opens a span for sampled requests.
pub async fn trace_middleware(
    State(sampler): State<Arc<Sampler>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let context = TraceContext::from_headers(request.headers());
    let sampled = sampler.sample(context.as_ref().is_some_and(|c| c.sampled));
    metrics::record_sampling(sampled);
    request.extensions_mut().insert(Sampled(sampled));

    if !sampled {
        return next.run(request).await;
    }

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let trace_id = context
        .map(|c| c.trace_id)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let span = ::tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
        trace_id = %trace_id,
        status = field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;
    span.record("status", response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    #[test]
    fn parses_cloud_trace_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CLOUD_TRACE_CONTEXT,
            HeaderValue::from_static("105445aa7843bc8bf206b12000100000/1;o=1"),
        );
        let ctx = TraceContext::from_headers(&headers).unwrap();
        assert_eq!(ctx.trace_id, "105445aa7843bc8bf206b12000100000");
        assert_eq!(ctx.parent_id.as_deref(), Some("1"));
        assert!(ctx.sampled);

        headers.insert(
            CLOUD_TRACE_CONTEXT,
            HeaderValue::from_static("105445aa7843bc8bf206b12000100000"),
        );
        let ctx = TraceContext::from_headers(&headers).unwrap();
        assert_eq!(ctx.parent_id, None);
        assert!(!ctx.sampled);

        headers.insert(CLOUD_TRACE_CONTEXT, HeaderValue::from_static("not-hex/1;o=1"));
        assert_eq!(TraceContext::from_headers(&headers), None);
    }

    #[test]
    fn parses_traceparent_and_prefers_it() {
        let mut headers = HeaderMap::new();
        headers.insert(
            TRACEPARENT,
            HeaderValue::from_static("00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01"),
        );
        headers.insert(CLOUD_TRACE_CONTEXT, HeaderValue::from_static("abc/1;o=0"));

        let ctx = TraceContext::from_headers(&headers).unwrap();
        assert_eq!(ctx.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_id.as_deref(), Some("00f067aa0ba902b7"));
        assert!(ctx.sampled);

        headers.insert(
            TRACEPARENT,
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00"),
        );
        assert!(!TraceContext::from_headers(&headers).unwrap().sampled);
    }

    #[test]
    fn malformed_traceparent_falls_back_to_cloud_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACEPARENT, HeaderValue::from_static("00-short-id-01"));
        headers.insert(CLOUD_TRACE_CONTEXT, HeaderValue::from_static("abc123/7;o=1"));
        let ctx = TraceContext::from_headers(&headers).unwrap();
        assert_eq!(ctx.trace_id, "abc123");
        assert!(ctx.sampled);
    }

    #[test]
    fn sampler_caps_rate() {
        let sampler = Sampler::new(1.0, 5.0);
        let now = Instant::now();
        let sampled = (0..20).filter(|_| sampler.sample_at(now, false)).count();
        assert_eq!(sampled, 5);

        // One second later the bucket has refilled.
        let later = now + Duration::from_secs(1);
        let sampled = (0..20).filter(|_| sampler.sample_at(later, false)).count();
        assert_eq!(sampled, 5);
    }

    #[test]
    fn zero_fraction_only_samples_forced() {
        let sampler = Sampler::new(0.0, 100.0);
        assert!(!sampler.sample(false));
        assert!(sampler.sample(true));
    }

    #[test]
    fn zero_rate_never_samples_unforced() {
        let sampler = Sampler::new(1.0, 0.0);
        let now = Instant::now() + Duration::from_secs(60);
        assert!(!sampler.sample_at(now, false));
        assert!(sampler.sample_at(now, true));
    }
}
