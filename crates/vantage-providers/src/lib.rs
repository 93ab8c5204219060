//! Provider client implementations for Vantage.
//!
//! This crate provides concrete implementations of the `Provider` trait.
//!
//! # Supported Backends
//!
//! - **Mock**: Testing and development
//! - **Claude**: Anthropic's Claude models (API key required)
//! - **Gemini**: Google's Gemini models (API key required)
//! - **OpenAI**: OpenAI's GPT models (API key required)

pub mod claude;
pub mod factory;
pub mod gemini;
pub mod openai;
pub mod response_cache;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;
use vantage_abstraction::{
    ChatMessage, GenerationParameters, Provider, ProviderError, ProviderReply, TokenUsage,
};

pub use claude::ClaudeProvider;
pub use factory::{ProviderConfig, ProviderFactory, ProviderKind};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use response_cache::{CacheKey, CacheStats, ResponseCache, ResponseCacheConfig};

/// How a `MockProvider` answers.
#[derive(Debug, Clone)]
enum MockBehavior {
    /// Echo the prompt back with a deterministic prefix.
    Echo,
    /// Always return the same content and usage accounting.
    Fixed { content: String, usage: TokenUsage },
    /// Always fail with the given cause.
    Fail(String),
}

/// A mock implementation of the `Provider` trait for testing and demonstration.
///
/// Every invocation increments an internal call counter so tests can assert
/// how many times the backend was actually reached (e.g., for cache tests).
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    behavior: MockBehavior,
    calls: AtomicU64,
}

impl MockProvider {
    /// Creates an echoing `MockProvider` with the given model ID.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self { id, behavior: MockBehavior::Echo, calls: AtomicU64::new(0) }
    }

    /// Creates a `MockProvider` that always returns `content` with the given
    /// token accounting.
    #[must_use]
    pub fn with_response(
        id: String,
        content: String,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> Self {
        Self {
            id,
            behavior: MockBehavior::Fixed {
                content,
                usage: TokenUsage::new(prompt_tokens, completion_tokens),
            },
            calls: AtomicU64::new(0),
        }
    }

    /// Creates a `MockProvider` that always fails with the given cause.
    #[must_use]
    pub fn failing(id: String, cause: impl Into<String>) -> Self {
        Self { id, behavior: MockBehavior::Fail(cause.into()), calls: AtomicU64::new(0) }
    }

    /// Number of times this provider has been invoked.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, prompt: &str) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Echo => {
                let content = format!("Mock response for: {prompt}");
                let prompt_tokens = count_tokens(prompt);
                let completion_tokens = count_tokens(&content);
                Ok(ProviderReply {
                    content,
                    model_id: Some(self.id.clone()),
                    usage: Some(TokenUsage::new(prompt_tokens, completion_tokens)),
                })
            }
            MockBehavior::Fixed { content, usage } => Ok(ProviderReply {
                content: content.clone(),
                model_id: Some(self.id.clone()),
                usage: Some(*usage),
            }),
            MockBehavior::Fail(cause) => Err(ProviderError::ResponseError(cause.clone())),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError> {
        debug!(
            model_id = %self.id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "MockProvider generating text"
        );
        self.answer(prompt)
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError> {
        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockProvider generating chat completion"
        );

        let prompt =
            messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
        self.answer(&prompt)
    }

    fn model_id(&self) -> &str {
        &self.id
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// Count tokens in a string (simplified: word count).
///
/// For a real implementation, this would use a proper tokenizer.
#[allow(clippy::cast_possible_truncation)]
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
