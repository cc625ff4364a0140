//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the caller sends none
//! - Keep a caller-supplied `x-request-id` untouched
//! - Echo the ID on the response for correlation
//!
//! # Design Decisions
//! - Request ID added as early as possible so every span and log line has it

use axum::http::{HeaderName, HeaderValue, Request};
use tower::ServiceBuilder;
use tower::layer::util::{Identity, Stack};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Layer stack that sets and propagates `x-request-id`.
pub type RequestIdLayer =
    ServiceBuilder<Stack<PropagateRequestIdLayer, Stack<SetRequestIdLayer<UuidRequestId>, Identity>>>;

/// Build the request ID layer stack. Set runs first, propagate copies the
/// final value onto the response.
pub fn request_id_layer() -> RequestIdLayer {
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
}
