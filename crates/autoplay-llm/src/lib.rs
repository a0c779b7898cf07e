//! Autoplay LLM - Completion service abstraction and provider adapters

pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::{CompletionService, LlmError, LlmResult};
pub use types::*;
