//! HTTP server.
//!
//! - [`api`]: Router, shared state and route handlers
//! - [`error`]: Handler error type and the `{error}` envelope
//! - [`streaming`]: SSE relay for incremental text

pub mod api;
pub mod error;
pub mod streaming;
