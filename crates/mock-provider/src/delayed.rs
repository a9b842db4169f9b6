//! Delayed provider - wraps another provider with artificial delay.

use std::time::Duration;

use chat_core::{
    async_trait, CancellationToken, ChatProvider, ChatRequest, ChunkSink, ProviderError,
};
use tokio::time::sleep;

/// A provider that wraps another provider and adds artificial delay.
///
/// Useful for testing abort timing and simulating slow endpoints. The token
/// is checked after the delay, so a cancellation arriving while the call is
/// "connecting" is honoured before any chunk flows.
pub struct DelayedProvider<P: ChatProvider> {
    inner: P,
    delay: Duration,
}

impl<P: ChatProvider> DelayedProvider<P> {
    /// Wrap the given provider with the specified delay.
    pub fn new(inner: P, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Wrap with a delay in milliseconds.
    pub fn with_millis(inner: P, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }
}

#[async_trait]
impl<P: ChatProvider> ChatProvider for DelayedProvider<P> {
    async fn chat(
        &self,
        request: ChatRequest,
        on_chunk: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError> {
        sleep(self.delay).await;
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        self.inner.chat(request, on_chunk, cancel).await
    }

    async fn list_models(
        &self,
        endpoint_url: &str,
        headers: &[chat_core::HttpHeader],
    ) -> Result<Vec<String>, ProviderError> {
        self.inner.list_models(endpoint_url, headers).await
    }

    fn name(&self) -> &str {
        "DelayedProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedProvider;
    use chat_core::ChatMessage;
    use std::sync::Arc;
    use std::time::Instant;

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
    async fn test_delays_before_streaming() {
        let provider = DelayedProvider::with_millis(ScriptedProvider::new(["ok"]), 50);

        let start = Instant::now();
        provider
            .chat(request(), Arc::new(|_: &str| {}), CancellationToken::new())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_cancel_during_delay() {
        let provider = DelayedProvider::with_millis(ScriptedProvider::new(["ok"]), 50);
        let token = CancellationToken::new();
        token.cancel();

        let result = provider.chat(request(), Arc::new(|_: &str| {}), token).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }
}
