//! Gateway HTTP API.
//!
//! - GET /health
//! - POST /process-text
//! - POST /stream-text

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::{self, Interpretation};
use crate::server::error::ApiError;
use crate::server::streaming::fragments_to_sse_stream;
use crate::upstream::TextGenerator;

/// Request bodies larger than this are rejected unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Application state shared across handlers.
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
    pub keep_alive: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>, keep_alive: Duration) -> Self {
        Self {
            generator,
            keep_alive,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.max_body_bytes));

    Router::new()
        .route("/health", get(health))
        .route("/process-text", post(process_text))
        .route("/stream-text", post(stream_text))
        .layer(middleware)
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Fallback body when the upstream text carries no JSON.
#[derive(Debug, Serialize)]
pub struct PlainTextResponse {
    pub mode: &'static str,
    pub content: String,
}

/// Pull the prompt out of a `{ "prompt": ... }` body.
///
/// Unparseable bodies, non-objects, a missing or null key and blank prompts
/// all count as a missing prompt. A prompt of any other JSON type is a
/// malformed body.
pub fn parse_prompt(body: &[u8]) -> Result<String, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::MissingPrompt)?;
    let prompt = value
        .as_object()
        .and_then(|fields| fields.get("prompt"))
        .ok_or(ApiError::MissingPrompt)?;

    match prompt {
        Value::Null => Err(ApiError::MissingPrompt),
        Value::String(s) if s.trim().is_empty() => Err(ApiError::MissingPrompt),
        Value::String(s) => Ok(s.clone()),
        _ => Err(ApiError::InvalidPrompt),
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn process_text(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let prompt = parse_prompt(&body?)?;
    let request_id = Uuid::new_v4();

    info!(
        request_id = %request_id,
        prompt_len = prompt.len(),
        "Process-text request"
    );

    let started = Instant::now();
    let text = state
        .generator
        .complete(&prompt)
        .await
        .inspect_err(|e| warn!(request_id = %request_id, error = %e, "Upstream completion failed"))?;

    let response = match extract::interpret(&text) {
        Interpretation::Json(value) => {
            info!(
                request_id = %request_id,
                elapsed = ?started.elapsed(),
                "Returning extracted JSON"
            );
            Json(value).into_response()
        }
        Interpretation::PlainText(content) => {
            info!(
                request_id = %request_id,
                elapsed = ?started.elapsed(),
                "Returning plain text"
            );
            Json(PlainTextResponse {
                mode: "plain_text",
                content,
            })
            .into_response()
        }
    };

    Ok(response)
}

async fn stream_text(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let prompt = parse_prompt(&body?)?;
    let request_id = Uuid::new_v4();

    info!(
        request_id = %request_id,
        prompt_len = prompt.len(),
        "Stream-text request"
    );

    let mut upstream = state
        .generator
        .complete_stream(&prompt)
        .await
        .inspect_err(|e| warn!(request_id = %request_id, error = %e, "Upstream stream failed to open"))?;

    // Wait for the first real fragment so that an early failure can still be
    // reported as a plain 500 before any response bytes are committed.
    let first = loop {
        match upstream.next().await {
            Some(Ok(fragment)) if fragment.is_empty() => continue,
            Some(Err(e)) => {
                warn!(request_id = %request_id, error = %e, "Upstream stream failed before first fragment");
                return Err(e.into());
            }
            other => break other,
        }
    };

    let fragments = stream::iter(first).chain(upstream);
    let events = fragments_to_sse_stream(fragments, request_id);

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(state.keep_alive))
        .into_response())
}
