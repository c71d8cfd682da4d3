//! Gemini REST client.
//!
//! Uses `models/{model}:generateContent` for whole answers and
//! `models/{model}:streamGenerateContent?alt=sse` for streaming. Every
//! streamed event is a partial `GenerateContentResponse` carrying the next
//! slice of text.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::sse::SseDecoder;
use super::{TextGenerator, TextStream, UpstreamError};
use crate::config::UpstreamConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ─── Wire Types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn user_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// Candidate text. No text with an abnormal finish reason (safety,
    /// recitation, ...) means the answer was blocked.
    fn checked_text(&self) -> Result<String, UpstreamError> {
        let text = self.text();
        if text.is_empty() {
            if let Some(reason) = self.finish_reason.as_ref().filter(|r| *r != "STOP") {
                return Err(UpstreamError::Blocked(reason.clone()));
            }
        }
        Ok(text)
    }
}

impl GenerateContentResponse {
    fn check_blocked(&self) -> Result<(), UpstreamError> {
        match self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_ref()) {
            Some(reason) => Err(UpstreamError::Blocked(reason.clone())),
            None => Ok(()),
        }
    }

    /// Text of a complete answer.
    fn into_text(self) -> Result<String, UpstreamError> {
        self.check_blocked()?;
        self.candidates
            .first()
            .ok_or(UpstreamError::NoCandidates)?
            .checked_text()
    }

    /// Text carried by one streamed event. Events without candidates (usage
    /// trailers) carry no text.
    fn chunk_text(&self) -> Result<String, UpstreamError> {
        self.check_blocked()?;
        match self.candidates.first() {
            Some(candidate) => candidate.checked_text(),
            None => Ok(String::new()),
        }
    }
}

fn decode_chunk(payload: &str) -> Result<String, UpstreamError> {
    serde_json::from_str::<GenerateContentResponse>(payload)
        .map_err(|e| UpstreamError::Decode(e.to_string()))?
        .chunk_text()
}

/// Prefer the `error.message` field of a Google error body over the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ─── Client ────────────────────────────────────────────────────────────────

/// Long-lived Gemini API handle, shared read-only across requests.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post(&self, url: &str, prompt: &str) -> Result<Response, UpstreamError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending request to Gemini API");

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateContentRequest::user_prompt(prompt))
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = api_error_message(&body);
        warn!(status = status.as_u16(), "Gemini API rejected request");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited(message));
        }
        Err(UpstreamError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        let response = self.post(&self.endpoint("generateContent"), prompt).await?;
        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        body.into_text()
    }

    async fn complete_stream(&self, prompt: &str) -> Result<TextStream, UpstreamError> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, prompt).await?;

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            loop {
                // Stop reading as soon as the consumer goes away, even if the
                // upstream is idle.
                let read = tokio::select! {
                    _ = tx.closed() => {
                        debug!("Stream consumer dropped, abandoning upstream read");
                        return;
                    }
                    read = body.next() => read,
                };
                let Some(read) = read else { break };

                let bytes = match read {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(UpstreamError::Network(e.to_string()))).await;
                        return;
                    }
                };

                for payload in decoder.push(&bytes) {
                    let item = decode_chunk(&payload);
                    let failed = item.is_err();
                    if tx.send(item).await.is_err() {
                        // Receiver dropped: the client went away.
                        debug!("Stream consumer dropped, abandoning upstream read");
                        return;
                    }
                    if failed {
                        return;
                    }
                }
            }

            if let Some(payload) = decoder.finish() {
                let _ = tx.send(decode_chunk(&payload)).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as TextStream)
    }
}
