//! Mock chat provider implementations for testing.
//!
//! This crate provides mock implementations of the `ChatProvider` trait:
//! - `EchoProvider` - Streams the last user message back
//! - `ScriptedProvider` - Streams preset chunks and records requests
//! - `DelayedProvider` - Wraps another provider with artificial delay
//! - `FailingProvider` - Streams some chunks, then fails
//!
//! For real backends, use the `openai-provider` or `ollama-provider`
//! crates instead.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mock_provider::{CancellationToken, ChatProvider, ChatRequest, ScriptedProvider};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), mock_provider::ProviderError> {
//!     let provider = ScriptedProvider::new(["Hel", "lo!"]);
//!
//!     let request = ChatRequest {
//!         messages: vec![chat_core::ChatMessage::user("hi")],
//!         model: "scripted-model".to_string(),
//!         endpoint_url: "http://localhost".to_string(),
//!         headers: Vec::new(),
//!         parameters: Default::default(),
//!     };
//!
//!     let collected = Arc::new(std::sync::Mutex::new(String::new()));
//!     let sink = collected.clone();
//!     provider
//!         .chat(
//!             request,
//!             Arc::new(move |chunk: &str| sink.lock().unwrap().push_str(chunk)),
//!             CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     assert_eq!(*collected.lock().unwrap(), "Hello!");
//!     Ok(())
//! }
//! ```

mod delayed;
mod echo;
mod failing;
mod scripted;

// Re-export chat-core types for convenience
pub use chat_core::{
    async_trait, CancellationToken, ChatMessage, ChatProvider, ChatRequest, ChunkSink,
    ProviderError,
};

pub use delayed::DelayedProvider;
pub use echo::EchoProvider;
pub use failing::FailingProvider;
pub use scripted::ScriptedProvider;
