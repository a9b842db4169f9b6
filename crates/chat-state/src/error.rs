//! Error types for state operations.

use chat_core::{ChatId, GroupId, MessageId, ProviderError};
use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur in the chat state layer.
#[derive(Debug, Error)]
pub enum StateError {
    /// A generation could not be attempted (no endpoint URL, no model, no
    /// provider registered). Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The chat id is not loaded and not in storage.
    #[error("chat not found: {0}")]
    ChatNotFound(ChatId),

    /// The group id does not exist in the directory.
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    /// The message id does not exist in the chat's tree.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// A generation is already streaming for this chat.
    #[error("a generation is already streaming for chat {0}")]
    AlreadyStreaming(ChatId),

    /// No provider profile with this name exists.
    #[error("unknown provider profile: {0}")]
    UnknownProfile(String),

    /// The provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
