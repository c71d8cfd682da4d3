//! SSE (Server-Sent Events) relay for incremental text.
//!
//! Converts a stream of upstream text fragments into `data:` events carrying
//! the new fragment plus the text accumulated so far, followed by one
//! terminal event.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::upstream::UpstreamError;

/// Payload of a single SSE event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    /// A new non-empty fragment and the cumulative text including it.
    Chunk { chunk: String, buffer: String },
    /// The upstream finished; `final_text` equals the last `buffer`.
    Complete { complete: bool, final_text: String },
    /// The upstream failed after streaming had started.
    Error { error: String },
}

impl StreamEvent {
    pub fn to_sse(&self) -> Event {
        let data = serde_json::to_string(self).unwrap_or_default();
        Event::default().data(data)
    }
}

/// Accumulates fragments and decides which event comes next.
struct Relay<S> {
    fragments: S,
    buffer: String,
    chunks: usize,
    finished: bool,
    request_id: Uuid,
}

impl<S> Relay<S>
where
    S: Stream<Item = Result<String, UpstreamError>> + Unpin,
{
    async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }

        loop {
            match self.fragments.next().await {
                Some(Ok(fragment)) => {
                    // Empty fragments are neither emitted nor accumulated.
                    if fragment.is_empty() {
                        continue;
                    }
                    self.buffer.push_str(&fragment);
                    self.chunks += 1;
                    return Some(StreamEvent::Chunk {
                        chunk: fragment,
                        buffer: self.buffer.clone(),
                    });
                }
                Some(Err(e)) => {
                    self.finished = true;
                    warn!(
                        request_id = %self.request_id,
                        chunks = self.chunks,
                        error = %e,
                        "Upstream stream failed after streaming began"
                    );
                    return Some(StreamEvent::Error {
                        error: e.to_string(),
                    });
                }
                None => {
                    self.finished = true;
                    info!(
                        request_id = %self.request_id,
                        chunks = self.chunks,
                        text_len = self.buffer.len(),
                        "Stream complete"
                    );
                    return Some(StreamEvent::Complete {
                        complete: true,
                        final_text: std::mem::take(&mut self.buffer),
                    });
                }
            }
        }
    }
}

/// Relay events for `fragments`, without SSE framing.
pub fn relay_events<S>(fragments: S, request_id: Uuid) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = Result<String, UpstreamError>> + Unpin,
{
    let relay = Relay {
        fragments,
        buffer: String::new(),
        chunks: 0,
        finished: false,
        request_id,
    };

    stream::unfold(relay, |mut relay| async move {
        let event = relay.next_event().await?;
        Some((event, relay))
    })
}

/// Convert upstream fragments into an SSE stream.
pub fn fragments_to_sse_stream<S>(
    fragments: S,
    request_id: Uuid,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = Result<String, UpstreamError>> + Unpin,
{
    relay_events(fragments, request_id).map(|event| Ok(event.to_sse()))
}
