use crate::config::SamplingParams;
use crate::error::ProviderError;

/// One chat completion: a system prompt, a user prompt and, for vision
/// requests, an inline image as a data URL.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub image_data_url: Option<String>,
    pub sampling: SamplingParams,
}

/// Trait for hosted inference providers (Groq, OpenRouter, any
/// OpenAI-compatible endpoint)
#[async_trait::async_trait]
pub trait InferenceService: Send + Sync {
    /// Single non-streamed completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Streamed completion, drained and concatenated before returning.
    async fn complete_streamed(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
