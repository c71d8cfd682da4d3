//! Best-effort recovery of a JSON payload embedded in model output.
//!
//! Models frequently wrap structured answers in Markdown code fences. The
//! candidate JSON text is located with a fixed precedence:
//!
//! 1. the body of the first ```` ```json ```` fence,
//! 2. otherwise the body of the first untagged ```` ``` ```` fence,
//! 3. otherwise the whole text.
//!
//! A fence that is opened but never closed is an extraction failure, and the
//! caller falls back to plain text.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Code fence opened at byte {0} is never closed")]
    UnclosedFence(usize),
}

/// Where a JSON candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    TaggedFence,
    GenericFence,
    RawText,
}

/// A slice of model output that may hold JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub source: CandidateSource,
    pub text: &'a str,
}

/// Locate the JSON candidate in `text`.
pub fn find_candidate(text: &str) -> Result<Candidate<'_>, ExtractError> {
    if let Some(open) = text.find(JSON_FENCE) {
        let body = fence_body(text, open, JSON_FENCE.len())?;
        return Ok(Candidate {
            source: CandidateSource::TaggedFence,
            text: body,
        });
    }

    if let Some(open) = text.find(FENCE) {
        let body = fence_body(text, open, FENCE.len())?;
        return Ok(Candidate {
            source: CandidateSource::GenericFence,
            text: body,
        });
    }

    Ok(Candidate {
        source: CandidateSource::RawText,
        text,
    })
}

/// Trimmed text between an opening delimiter at `open` and the next fence.
fn fence_body(text: &str, open: usize, delimiter_len: usize) -> Result<&str, ExtractError> {
    let start = open + delimiter_len;
    let len = text[start..]
        .find(FENCE)
        .ok_or(ExtractError::UnclosedFence(open))?;
    Ok(text[start..start + len].trim())
}

/// How upstream text should be returned to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// The text carried a JSON value; return it verbatim.
    Json(Value),
    /// No usable JSON; return the raw text.
    PlainText(String),
}

/// Interpret raw model output as JSON when possible, plain text otherwise.
pub fn interpret(raw: &str) -> Interpretation {
    let candidate = match find_candidate(raw) {
        Ok(candidate) => candidate,
        Err(e) => {
            debug!(error = %e, "No JSON candidate, returning plain text");
            return Interpretation::PlainText(raw.to_string());
        }
    };

    match serde_json::from_str::<Value>(candidate.text) {
        Ok(value) => {
            debug!(source = ?candidate.source, "Recovered JSON from upstream text");
            Interpretation::Json(value)
        }
        Err(e) => {
            debug!(source = ?candidate.source, error = %e, "Candidate is not JSON, returning plain text");
            Interpretation::PlainText(raw.to_string())
        }
    }
}
