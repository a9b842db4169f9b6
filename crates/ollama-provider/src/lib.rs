//! Ollama streaming backend.
//!
//! This crate provides [`OllamaProvider`], a `ChatProvider` implementation
//! for Ollama servers. Responses stream as newline-delimited JSON and are
//! forwarded fragment by fragment until the `done` line arrives.

mod api_types;
mod provider;

pub use api_types::{ChatOptions, OllamaChatChunk, OllamaChatRequest};
pub use provider::OllamaProvider;

// Re-export the boundary types
pub use chat_core::{ChatProvider, ProviderError};
