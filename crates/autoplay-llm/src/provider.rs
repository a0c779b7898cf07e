//! Completion service trait

use crate::types::Message;
use bytes::Bytes;
use std::time::Duration;

/// Result type for completion service operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Completion service error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// The generative service behind enrichment requests and narration.
///
/// Failures are reported through [`LlmError`]; callers treat every variant as a
/// transient, non-fatal outcome.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    /// Complete a conversation: `history` is the prior context, `message` the new turn.
    /// Returns the reply text.
    async fn complete_multimodal(&self, history: &[Message], message: &Message)
        -> LlmResult<String>;

    /// Single-shot text completion without conversation history.
    async fn complete_text(&self, prompt: &str) -> LlmResult<String>;

    /// Synthesize `text` to encoded audio.
    async fn synthesize_speech(&self, text: &str) -> LlmResult<Bytes>;
}
