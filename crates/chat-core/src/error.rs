//! Error types for provider operations.

use thiserror::Error;

/// Errors that can occur during a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The call could not be attempted (bad endpoint, missing model, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure before or during the call.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with an error status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A streamed chunk could not be read or parsed.
    #[error("stream error: {0}")]
    Stream(String),

    /// The cancellation token fired mid-call. Not a failure.
    #[error("generation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// True for the cancellation outcome, which callers treat as clean.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }
}
