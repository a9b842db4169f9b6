//! Core types and traits for the local-first chat engine.
//!
//! This crate provides the shared vocabulary for all chat components:
//!
//! - [`MessageTree`] / [`MessageNode`] - The branching conversation structure
//! - [`Chat`] / [`ChatGroup`] - The chat entity and its optional container
//! - [`GlobalSettings`] / [`SettingsOverrides`] - The three configuration tiers
//! - [`Attachment`] - Binary attachments, memory-held or persisted
//! - [`ChatProvider`] - The trait every LLM backend implements
//! - [`CancellationToken`] - Cooperative cancellation for streaming calls
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Example
//!
//! ```rust
//! use chat_core::{async_trait, CancellationToken, ChatProvider, ChatRequest,
//!                 ChunkSink, HttpHeader, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl ChatProvider for MyProvider {
//!     async fn chat(
//!         &self,
//!         _request: ChatRequest,
//!         on_chunk: ChunkSink,
//!         _cancel: CancellationToken,
//!     ) -> Result<(), ProviderError> {
//!         on_chunk("Hello!");
//!         Ok(())
//!     }
//!
//!     async fn list_models(
//!         &self,
//!         _endpoint_url: &str,
//!         _headers: &[HttpHeader],
//!     ) -> Result<Vec<String>, ProviderError> {
//!         Ok(vec!["my-model".to_string()])
//!     }
//!
//!     fn name(&self) -> &str {
//!         "MyProvider"
//!     }
//! }
//! ```

mod attachment;
mod chat;
mod error;
mod message;
mod provider;
mod settings;

pub use attachment::{Attachment, AttachmentId, AttachmentMeta};
pub use chat::{Chat, ChatGroup, ChatId, GroupId};
pub use error::ProviderError;
pub use message::{ChatMessage, MessageId, MessageNode, MessageRole, MessageTree};
pub use provider::{CancellationToken, ChatProvider, ChatRequest, ChunkSink};
pub use settings::{
    EndpointType, GlobalSettings, HttpHeader, LmParameters, PromptBehavior, ProviderProfile,
    SettingsOverrides, StorageType, SystemPromptOverride,
};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
