//! Scripted provider - streams preset chunks and records every request.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chat_core::{
    async_trait, CancellationToken, ChatProvider, ChatRequest, ChunkSink, ProviderError,
};
use tokio::time::sleep;

/// A provider that streams a fixed chunk sequence.
///
/// Every request is recorded for assertions, which is how tests observe the
/// exact model, endpoint and parameters a generation resolved to. An
/// optional inter-chunk delay keeps the stream open long enough for abort
/// paths to be exercised; the cancellation token is polled before every
/// chunk, like a real streaming backend checking between network reads.
pub struct ScriptedProvider {
    chunks: Vec<String>,
    models: Vec<String>,
    chunk_delay: Duration,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    /// Create a provider that streams the given chunks back to back.
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            models: vec!["scripted-model".to_string()],
            chunk_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep between chunks, keeping the stream open for abort tests.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Models reported by `list_models`.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock_requests().clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.lock_requests().last().cloned()
    }

    /// Number of chat calls made.
    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<ChatRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat(
        &self,
        request: ChatRequest,
        on_chunk: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError> {
        self.lock_requests().push(request);

        for chunk in &self.chunks {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            on_chunk(chunk);
            if !self.chunk_delay.is_zero() {
                sleep(self.chunk_delay).await;
            }
        }

        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        Ok(())
    }

    async fn list_models(
        &self,
        _endpoint_url: &str,
        _headers: &[chat_core::HttpHeader],
    ) -> Result<Vec<String>, ProviderError> {
        Ok(self.models.clone())
    }

    fn name(&self) -> &str {
        "ScriptedProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::ChatMessage;
    use std::sync::Arc;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            model: "scripted-model".to_string(),
            endpoint_url: "http://localhost".to_string(),
            headers: Vec::new(),
            parameters: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_streams_all_chunks() {
        let provider = ScriptedProvider::new(["a", "b", "c"]);
        let collected = Arc::new(Mutex::new(String::new()));
        let sink = collected.clone();

        provider
            .chat(
                request(),
                Arc::new(move |chunk: &str| sink.lock().unwrap().push_str(chunk)),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(*collected.lock().unwrap(), "abc");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_request().unwrap().model, "scripted-model");
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_streams_nothing() {
        let provider = ScriptedProvider::new(["a", "b"]);
        let token = CancellationToken::new();
        token.cancel();

        let result = provider
            .chat(request(), Arc::new(|_: &str| {}), token)
            .await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn test_list_models() {
        let provider = ScriptedProvider::new(["x"]).with_models(["m1", "m2"]);
        let models = provider.list_models("http://localhost", &[]).await.unwrap();
        assert_eq!(models, vec!["m1".to_string(), "m2".to_string()]);
    }
}
