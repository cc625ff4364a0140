//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (add or keep x-request-id)
//!     → [trace sampling] → [retry budget]
//!     → handler.rs (redirect, or body → formatter)
//!     → response.rs (buffer or stream output, map errors)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id_layer, X_REQUEST_ID};
pub use server::{router, AppState, HttpServer, Layers};
