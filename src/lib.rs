//! gemini-gateway: thin HTTP gateway in front of the Gemini generative-language API.
//!
//! Forwards text prompts upstream and relays the answer either as one JSON
//! payload (recovering JSON embedded in Markdown code fences when present) or
//! as a server-sent-event stream of incremental text chunks.
//!
//! - [`config`]: CLI, file and environment configuration
//! - [`extract`]: Fenced-code-block finder and JSON recovery
//! - [`server`]: Router, handlers and SSE relay
//! - [`upstream`]: Upstream text generator trait and the Gemini client

pub mod config;
pub mod extract;
pub mod server;
pub mod upstream;
