//! format-relay: an HTTP front end that formats source code with an external
//! formatter (clang-format by default).
//!
//! # Architecture Overview
//!
//! ```text
//!     Client POST /          ┌──────────────────────────────────────────────┐
//!     ───────────────────────┼─▶ request id ─▶ sampling ─▶ retry budget ─┐  │
//!                            │                                         ▼  │
//!                            │                              format handler │
//!                            │                                    │        │
//!                            │              request body ─▶ stdin │        │
//!                            │                             ┌──────▼──────┐ │
//!                            │                             │ clang-format│ │
//!                            │                             └──────┬──────┘ │
//!     Client response        │   relay (buffer up to threshold,   │ stdout │
//!     ◀──────────────────────┼── then stream) ◀────────────────────┘        │
//!                            └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod format;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
