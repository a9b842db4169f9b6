//! The provider boundary: one trait every LLM backend satisfies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::message::ChatMessage;
use crate::settings::{HttpHeader, LmParameters};

/// Callback invoked with each streamed content chunk.
///
/// `Arc<dyn Fn>` so a generation can hand clones to retry paths or wrappers.
pub type ChunkSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Cooperative cancellation token for streaming calls.
///
/// The generation lifecycle owns creation and firing; providers poll it
/// between chunks and bail out with [`ProviderError::Cancelled`]. Firing is
/// idempotent and safe after the call has already settled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the "not cancelled" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One fully-resolved chat call, ready for any backend.
///
/// The message list is the flattened active path with the resolved system
/// segments prepended; nothing here refers back to the settings tiers.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub endpoint_url: String,
    pub headers: Vec<HttpHeader>,
    pub parameters: LmParameters,
}

/// The trait all chat backends implement.
///
/// Implementations stream content through `on_chunk` and must poll `cancel`
/// between chunks. The HTTP OpenAI-compatible adapter, the Ollama adapter
/// and any in-process engine all satisfy this shape; the state layer is
/// agnostic to which one it talks to.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one streaming chat call to completion, cancellation or failure.
    async fn chat(
        &self,
        request: ChatRequest,
        on_chunk: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError>;

    /// List the model ids the endpoint offers.
    async fn list_models(
        &self,
        endpoint_url: &str,
        headers: &[HttpHeader],
    ) -> Result<Vec<String>, ProviderError>;

    /// Short human-readable backend name, used in logs.
    fn name(&self) -> &str;
}
