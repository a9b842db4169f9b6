//! HTTP OpenAI-compatible streaming backend.
//!
//! This crate provides [`OpenAiProvider`], a `ChatProvider` implementation
//! for any endpoint speaking the OpenAI chat-completions protocol. Content
//! arrives as Server-Sent Events and is forwarded chunk by chunk; the
//! cancellation token is polled between events so an abort lands within one
//! chunk of being requested.

mod api_types;
mod provider;

pub use api_types::{ChatCompletionChunk, ChatCompletionRequest, WireMessage};
pub use provider::OpenAiProvider;

// Re-export the boundary types implementors of custom clients need
pub use chat_core::{ChatProvider, ProviderError};
