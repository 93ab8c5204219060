//! Provider abstraction layer for Vantage.
//!
//! This module defines the core trait and types for interacting with external
//! AI text-generation backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when invoking an AI provider.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderError {
    /// An error occurred during the API request (e.g., network issues, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The provider did not answer within the allotted time budget.
    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The provider name (e.g., "anthropic", "openai").
        provider: String,
        /// The timeout that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The provider returned an error (e.g., invalid input, server-side failure).
    #[error("Provider Response Error: {0}")]
    ResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The provider is not supported or not configured.
    #[error("Unsupported Provider: {0}")]
    UnsupportedProvider(String),

    /// Provider quota exceeded or rate limit hit (hard stop error).
    #[error("Provider '{provider}' quota exceeded")]
    QuotaExceeded {
        /// The provider name.
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Provider Error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Returns `true` for failures that are worth retrying on a different
    /// backend (everything except configuration mistakes).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::UnsupportedProvider(_))
    }
}

/// Represents a message in a conversation with a chat-capable provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor for a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Convenience constructor for a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Parameters for controlling a provider's generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// What sampling temperature to use, between 0 and 2.
    /// Higher values mean the model will take more risks.
    pub temperature: Option<f32>,

    /// An alternative to sampling with temperature, called nucleus sampling,
    /// where the model considers the results of the tokens with `top_p` probability mass.
    pub top_p: Option<f32>,

    /// The maximum number of tokens to generate in the completion.
    pub max_tokens: Option<u32>,

    /// Up to 4 sequences where the API will stop generating further tokens.
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: Some(1.0),
            max_tokens: Some(1024),
            stop_sequences: None,
        }
    }
}

/// The raw response from a text generation or chat completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReply {
    /// The generated content.
    pub content: String,

    /// Optional: The ID of the model that generated the response.
    pub model_id: Option<String>,

    /// Optional: Usage accounting for the request, when the backend reports it.
    pub usage: Option<TokenUsage>,
}

/// Token usage accounting for a single provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Builds usage accounting from prompt/completion counts.
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
    }
}

/// A trait for interacting with different AI providers.
///
/// All providers must be `Send + Sync` to allow concurrent use across threads.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generates a text completion based on the given prompt.
    ///
    /// # Arguments
    /// * `prompt` - The input prompt for text generation
    /// * `parameters` - Optional parameters to control generation
    ///
    /// # Errors
    /// Returns a `ProviderError` if generation fails.
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError>;

    /// Generates a chat completion based on the given conversation history.
    ///
    /// # Arguments
    /// * `messages` - The conversation history as a slice of chat messages
    /// * `parameters` - Optional parameters to control generation
    ///
    /// # Errors
    /// Returns a `ProviderError` if generation fails.
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError>;

    /// Returns the ID of the model this client talks to.
    fn model_id(&self) -> &str;

    /// Returns the backend name (e.g., "anthropic", "openai", "gemini", "mock").
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = GenerationParameters::default();
        assert_eq!(params.temperature, Some(0.7));
        assert_eq!(params.max_tokens, Some(1024));
        assert!(params.stop_sequences.is_none());
    }

    #[test]
    fn test_token_usage_totals() {
        let usage = TokenUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_timeout_error_display() {
        let err = ProviderError::Timeout { provider: "openai".to_string(), timeout_ms: 20_000 };
        assert_eq!(err.to_string(), "Provider 'openai' timed out after 20000ms");
    }

    #[test]
    fn test_unsupported_provider_not_retryable() {
        assert!(!ProviderError::UnsupportedProvider("nope".to_string()).is_retryable());
        assert!(ProviderError::RequestError("connection reset".to_string()).is_retryable());
    }
}
