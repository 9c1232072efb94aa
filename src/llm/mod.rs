//! Chat-completion client used by `summarize`.

pub mod error;
#[cfg(test)]
pub mod mock;
pub mod openai;

use async_trait::async_trait;

pub use error::OpenAiError;

/// One summarization call: a system prompt plus one rendered user prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, OpenAiError>;
}
