//! Claude (Anthropic) provider implementation.
//!
//! Claude uses a dedicated `system` field for system instructions: system
//! messages are extracted from the conversation and sent separately, while the
//! remaining messages form the `messages` array.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};
use vantage_abstraction::{
    ChatMessage, GenerationParameters, Provider, ProviderError, ProviderReply, TokenUsage,
};

/// Claude provider implementation.
#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    /// The model ID (e.g., "claude-sonnet-4-5", "claude-haiku-4-5").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Claude API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl ClaudeProvider {
    /// Creates a new `ClaudeProvider` with the given model ID.
    ///
    /// # Errors
    /// Returns a `ProviderError` if `ANTHROPIC_API_KEY` is not set.
    pub fn new(model_id: String) -> Result<Self, ProviderError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ProviderError::UnsupportedProvider(
                "ANTHROPIC_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self {
            model_id,
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
            client: Client::new(),
        })
    }

    /// Creates a new `ClaudeProvider` with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
            client: Client::new(),
        }
    }

    /// Overrides the API base URL (used by tests against a local HTTP mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Converts our ChatMessage to Claude API message format.
    fn to_claude_message(msg: &ChatMessage) -> ClaudeMessage {
        ClaudeMessage {
            role: if msg.role == "assistant" { "assistant" } else { "user" }.to_string(),
            content: msg.content.clone(),
        }
    }

    /// Extracts the first system message from the chat history.
    ///
    /// System messages are filtered out of the main array and sent via the
    /// dedicated `system` field instead.
    fn extract_system_prompt(messages: &[ChatMessage]) -> Option<String> {
        messages.iter().find(|msg| msg.role == "system").map(|msg| msg.content.clone())
    }

    /// Maps a non-success status to the appropriate `ProviderError`.
    fn map_error_status(status: reqwest::StatusCode, error_text: String) -> ProviderError {
        if status == 402 || status == 429 {
            return ProviderError::QuotaExceeded {
                provider: "anthropic".to_string(),
                message: Some(error_text),
            };
        }

        ProviderError::ResponseError(format!("API error ({}): {}", status, error_text))
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            "ClaudeProvider generating text"
        );

        // Convert single prompt to chat format for Claude
        let messages = vec![ChatMessage::user(prompt)];

        self.generate_chat_completion(&messages, parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            "ClaudeProvider generating chat completion"
        );

        let url = format!("{}/messages", self.base_url);

        let system = Self::extract_system_prompt(messages);
        let claude_messages: Vec<ClaudeMessage> = messages
            .iter()
            .filter(|msg| msg.role != "system")
            .map(Self::to_claude_message)
            .collect();

        let mut request_body = ClaudeRequest {
            model: self.model_id.clone(),
            messages: claude_messages,
            max_tokens: 4096,
            system,
            temperature: None,
            top_p: None,
            stop_sequences: None,
        };

        if let Some(params) = parameters {
            request_body.temperature = params.temperature;
            request_body.top_p = params.top_p;
            if let Some(max_tokens) = params.max_tokens {
                request_body.max_tokens = max_tokens;
            }
            request_body.stop_sequences = params.stop_sequences;
        }

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Claude API");
                ProviderError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "Claude API returned error status"
            );
            return Err(Self::map_error_status(status, error_text));
        }

        let claude_response: ClaudeResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Claude API response");
            ProviderError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let content = claude_response
            .content
            .iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text.clone())
            .ok_or_else(|| {
                error!("No text content in Claude API response");
                ProviderError::ResponseError("No text content in API response".to_string())
            })?;

        let usage = Some(TokenUsage::new(
            claude_response.usage.input_tokens,
            claude_response.usage.output_tokens,
        ));

        Ok(ProviderReply { content, model_id: Some(self.model_id.clone()), usage })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

// Claude API request/response structures

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_with_api_key() {
        let provider =
            ClaudeProvider::with_api_key("claude-sonnet-4-5".to_string(), "test-key".to_string());
        assert_eq!(provider.model_id(), "claude-sonnet-4-5");
        assert_eq!(provider.provider_name(), "anthropic");
    }

    #[test]
    fn test_system_prompt_extraction() {
        let messages = vec![
            ChatMessage::system("You are helpful"),
            ChatMessage::user("Hello"),
        ];
        let system = ClaudeProvider::extract_system_prompt(&messages);
        assert_eq!(system, Some("You are helpful".to_string()));
    }

    #[test]
    fn test_error_status_mapping() {
        let err = ClaudeProvider::map_error_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "rate limited".to_string(),
        );
        assert!(matches!(err, ProviderError::QuotaExceeded { .. }));

        let err = ClaudeProvider::map_error_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom".to_string(),
        );
        assert!(matches!(err, ProviderError::ResponseError(_)));
    }

    #[tokio::test]
    async fn test_chat_completion_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content":[{"type":"text","text":"Acme holds 12% share"}],"usage":{"input_tokens":42,"output_tokens":7}}"#,
            )
            .create_async()
            .await;

        let provider =
            ClaudeProvider::with_api_key("claude-haiku-4-5".to_string(), "test-key".to_string())
                .with_base_url(server.url());
        let reply = provider
            .generate_chat_completion(&[ChatMessage::user("Summarize Acme")], None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.content, "Acme holds 12% share");
        assert_eq!(reply.usage.unwrap().total_tokens, 49);
    }

    #[tokio::test]
    async fn test_quota_exceeded_on_429() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(429)
            .with_body(r#"{"error":{"type":"rate_limit_error","message":"Rate limit exceeded"}}"#)
            .create_async()
            .await;

        let provider =
            ClaudeProvider::with_api_key("claude-haiku-4-5".to_string(), "test-key".to_string())
                .with_base_url(server.url());
        let err = provider.generate_text("hello", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::QuotaExceeded { .. }));
    }
}
