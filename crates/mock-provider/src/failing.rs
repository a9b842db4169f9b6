//! Failing provider - streams some chunks, then fails.

use chat_core::{
    async_trait, CancellationToken, ChatProvider, ChatRequest, ChunkSink, ProviderError,
};

/// A provider that fails after streaming a configurable partial response.
///
/// Used to assert that partial content survives a provider failure and the
/// generation bookkeeping still clears.
pub struct FailingProvider {
    chunks: Vec<String>,
    message: String,
}

impl FailingProvider {
    /// Fail immediately, with no partial content.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            message: message.into(),
        }
    }

    /// Stream the given chunks first, then fail.
    pub fn with_partial<I, S>(chunks: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for FailingProvider {
    async fn chat(
        &self,
        _request: ChatRequest,
        on_chunk: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError> {
        for chunk in &self.chunks {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            on_chunk(chunk);
        }
        Err(ProviderError::Network(self.message.clone()))
    }

    async fn list_models(
        &self,
        _endpoint_url: &str,
        _headers: &[chat_core::HttpHeader],
    ) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Network(self.message.clone()))
    }

    fn name(&self) -> &str {
        "FailingProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::ChatMessage;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_fails_after_partial_content() {
        let provider = FailingProvider::with_partial(["par", "tial"], "connection reset");
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            model: "m".to_string(),
            endpoint_url: "http://localhost".to_string(),
            headers: Vec::new(),
            parameters: Default::default(),
        };

        let collected = Arc::new(Mutex::new(String::new()));
        let sink = collected.clone();
        let result = provider
            .chat(
                request,
                Arc::new(move |chunk: &str| sink.lock().unwrap().push_str(chunk)),
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(ProviderError::Network(_))));
        assert_eq!(*collected.lock().unwrap(), "partial");
    }
}
