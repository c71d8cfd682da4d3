//! Scripted generator for exercising handlers without network access.

use async_trait::async_trait;

use super::{TextGenerator, TextStream, UpstreamError};

/// Replays a fixed answer and a fixed fragment sequence for every prompt.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    reply: String,
    fragments: Vec<String>,
    fail_mid_stream: Option<UpstreamError>,
    fail_on_call: Option<UpstreamError>,
}

impl MockGenerator {
    /// `complete` returns `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    /// `complete_stream` yields `fragments` in order, then ends.
    pub fn streaming<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Both operations fail before producing anything.
    pub fn failing(error: UpstreamError) -> Self {
        Self {
            fail_on_call: Some(error),
            ..Self::default()
        }
    }

    /// The stream yields `error` after its fragments instead of ending cleanly.
    pub fn then_fail(mut self, error: UpstreamError) -> Self {
        self.fail_mid_stream = Some(error);
        self
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String, UpstreamError> {
        if let Some(error) = &self.fail_on_call {
            return Err(error.clone());
        }
        Ok(self.reply.clone())
    }

    async fn complete_stream(&self, _prompt: &str) -> Result<TextStream, UpstreamError> {
        if let Some(error) = &self.fail_on_call {
            return Err(error.clone());
        }

        let items: Vec<Result<String, UpstreamError>> = self
            .fragments
            .iter()
            .cloned()
            .map(Ok)
            .chain(self.fail_mid_stream.clone().map(Err))
            .collect();

        Ok(Box::pin(futures::stream::iter(items)) as TextStream)
    }
}
