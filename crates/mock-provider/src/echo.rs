//! Echo provider - streams the last user message back, word by word.

use chat_core::{
    async_trait, CancellationToken, ChatProvider, ChatRequest, ChunkSink, MessageRole,
    ProviderError,
};

/// A provider that echoes the last user message.
///
/// Content streams one whitespace-separated word per chunk, so even the
/// echo path exercises incremental tree updates.
#[derive(Debug, Clone, Default)]
pub struct EchoProvider;

impl EchoProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatProvider for EchoProvider {
    async fn chat(
        &self,
        request: ChatRequest,
        on_chunk: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError> {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .map(|message| message.content.clone())
            .unwrap_or_default();

        for (i, word) in text.split_whitespace().enumerate() {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            if i > 0 {
                on_chunk(" ");
            }
            on_chunk(word);
        }
        Ok(())
    }

    async fn list_models(
        &self,
        _endpoint_url: &str,
        _headers: &[chat_core::HttpHeader],
    ) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["echo".to_string()])
    }

    fn name(&self) -> &str {
        "EchoProvider"
    }
}
