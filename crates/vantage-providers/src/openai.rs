//! OpenAI provider implementation.
//!
//! Unlike Claude and Gemini, OpenAI takes system messages inline in the
//! messages array with `role: "system"`, so no extraction step is needed.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};
use vantage_abstraction::{
    ChatMessage, GenerationParameters, Provider, ProviderError, ProviderReply, TokenUsage,
};

/// OpenAI provider implementation.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    /// The model ID (e.g., "gpt-4o", "gpt-4o-mini").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the OpenAI API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAiProvider {
    /// Creates a new `OpenAiProvider` with the given model ID.
    ///
    /// # Errors
    /// Returns a `ProviderError` if `OPENAI_API_KEY` is not set.
    pub fn new(model_id: String) -> Result<Self, ProviderError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ProviderError::UnsupportedProvider(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self {
            model_id,
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            client: Client::new(),
        })
    }

    /// Creates a new `OpenAiProvider` with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            client: Client::new(),
        }
    }

    /// Overrides the API base URL (used by tests against a local HTTP mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            "OpenAiProvider generating text"
        );

        // Convert single prompt to chat format for OpenAI
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
            "OpenAiProvider generating chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);

        let openai_messages: Vec<OpenAiMessage> = messages
            .iter()
            .map(|msg| OpenAiMessage { role: msg.role.clone(), content: msg.content.clone() })
            .collect();

        let mut request_body = OpenAiRequest {
            model: self.model_id.clone(),
            messages: openai_messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
        };

        if let Some(params) = parameters {
            request_body.temperature = params.temperature;
            request_body.top_p = params.top_p;
            request_body.max_tokens = params.max_tokens;
            request_body.stop = params.stop_sequences;
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to OpenAI API");
                ProviderError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "OpenAI API returned error status"
            );

            if status == 402 || status == 429 {
                return Err(ProviderError::QuotaExceeded {
                    provider: "openai".to_string(),
                    message: Some(error_text),
                });
            }

            return Err(ProviderError::ResponseError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let openai_response: OpenAiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse OpenAI API response");
            ProviderError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let content = openai_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                error!("No choices in OpenAI API response");
                ProviderError::ResponseError("No choices in API response".to_string())
            })?;

        let usage = openai_response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        Ok(ProviderReply { content, model_id: Some(self.model_id.clone()), usage })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_with_api_key() {
        let provider = OpenAiProvider::with_api_key("gpt-4o".to_string(), "test-key".to_string());
        assert_eq!(provider.model_id(), "gpt-4o");
        assert_eq!(provider.provider_name(), "openai");
    }

    #[tokio::test]
    async fn test_chat_completion_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}],"usage":{"prompt_tokens":10,"completion_tokens":5}}"#,
            )
            .create_async()
            .await;

        let provider = OpenAiProvider::with_api_key("gpt-4o-mini".to_string(), "k".to_string())
            .with_base_url(server.url());
        let reply = provider.generate_text("ping", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.content, "ok");
        assert_eq!(reply.usage.unwrap().prompt_tokens, 10);
    }

    #[tokio::test]
    async fn test_response_without_usage_accounting() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"no usage"}}]}"#)
            .create_async()
            .await;

        let provider = OpenAiProvider::with_api_key("gpt-4o-mini".to_string(), "k".to_string())
            .with_base_url(server.url());
        let reply = provider.generate_text("ping", None).await.unwrap();
        assert!(reply.usage.is_none());
    }
}
