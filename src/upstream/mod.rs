//! Upstream generative-language providers.
//!
//! - [`gemini`]: REST client for the Gemini API
//! - [`sse`]: Incremental decoder for the upstream event stream
//! - [`mock`]: Scripted generator for tests

pub mod gemini;
pub mod mock;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;
use thiserror::Error;

/// Error type for upstream operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Gemini API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by Gemini API: {0}")]
    RateLimited(String),

    #[error("Request blocked by Gemini: {0}")]
    Blocked(String),

    #[error("Gemini API returned no candidates")]
    NoCandidates,

    #[error("Failed to decode Gemini response: {0}")]
    Decode(String),
}

/// Lazily produced text fragments. Finite and not restartable; dropping it
/// abandons the upstream read.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

/// A text-completion backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Submit a prompt and wait for the whole answer.
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError>;

    /// Submit a prompt in streaming mode.
    async fn complete_stream(&self, prompt: &str) -> Result<TextStream, UpstreamError>;
}
