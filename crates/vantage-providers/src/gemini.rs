//! Google Gemini provider implementation.
//!
//! Gemini follows the same dedicated-system-field pattern as Claude: system
//! messages are concatenated into the `systemInstruction` field, and the
//! remaining messages map to `contents` with roles `user`/`model`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};
use vantage_abstraction::{
    ChatMessage, GenerationParameters, Provider, ProviderError, ProviderReply, TokenUsage,
};

/// Google Gemini provider implementation.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    /// The model ID (e.g., "gemini-2.0-flash", "gemini-1.5-pro").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Gemini API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` with the given model ID.
    ///
    /// # Errors
    /// Returns a `ProviderError` if `GEMINI_API_KEY` is not set.
    pub fn new(model_id: String) -> Result<Self, ProviderError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            ProviderError::UnsupportedProvider(
                "GEMINI_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self {
            model_id,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            client: Client::new(),
        })
    }

    /// Creates a new `GeminiProvider` with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            client: Client::new(),
        }
    }

    /// Overrides the API base URL (used by tests against a local HTTP mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Converts our ChatMessage role to Gemini API role format.
    ///
    /// System messages must be filtered out before calling this, as they are
    /// handled separately via the `systemInstruction` field.
    fn role_to_gemini(role: &str) -> String {
        match role {
            "assistant" => "model".to_string(),
            _ => "user".to_string(),
        }
    }

    /// Concatenates all system messages with a blank-line separator.
    fn extract_system_messages(messages: &[ChatMessage]) -> Option<String> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|msg| msg.role == "system")
            .map(|msg| msg.content.as_str())
            .collect();

        if system.is_empty() { None } else { Some(system.join("\n\n")) }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<GenerationParameters>,
    ) -> Result<ProviderReply, ProviderError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            "GeminiProvider generating text"
        );

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
            "GeminiProvider generating chat completion"
        );

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model_id, self.api_key
        );

        let system_instruction = Self::extract_system_messages(messages).map(|text| {
            GeminiContent { role: None, parts: vec![GeminiPart { text }] }
        });

        let contents: Vec<GeminiContent> = messages
            .iter()
            .filter(|msg| msg.role != "system")
            .map(|msg| GeminiContent {
                role: Some(Self::role_to_gemini(&msg.role)),
                parts: vec![GeminiPart { text: msg.content.clone() }],
            })
            .collect();

        let generation_config = parameters.map(|params| GeminiGenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            max_output_tokens: params.max_tokens,
            stop_sequences: params.stop_sequences,
        });

        let request_body = GeminiRequest { contents, system_instruction, generation_config };

        let response =
            self.client.post(&url).json(&request_body).send().await.map_err(|e| {
                error!(error = %e, "Failed to send request to Gemini API");
                ProviderError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "Gemini API returned error status"
            );

            if status == 429 {
                return Err(ProviderError::QuotaExceeded {
                    provider: "gemini".to_string(),
                    message: Some(error_text),
                });
            }

            return Err(ProviderError::ResponseError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini API response");
            ProviderError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let content = gemini_response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .ok_or_else(|| {
                error!("No candidates in Gemini API response");
                ProviderError::ResponseError("No candidates in API response".to_string())
            })?;

        let usage = gemini_response
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count));

        Ok(ProviderReply { content, model_id: Some(self.model_id.clone()), usage })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: u32,
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_with_api_key() {
        let provider =
            GeminiProvider::with_api_key("gemini-2.0-flash".to_string(), "test-key".to_string());
        assert_eq!(provider.model_id(), "gemini-2.0-flash");
        assert_eq!(provider.provider_name(), "gemini");
    }

    #[test]
    fn test_role_mapping() {
        assert_eq!(GeminiProvider::role_to_gemini("assistant"), "model");
        assert_eq!(GeminiProvider::role_to_gemini("user"), "user");
    }

    #[test]
    fn test_system_message_concatenation() {
        let messages = vec![
            ChatMessage::system("First instruction"),
            ChatMessage::user("Hello"),
            ChatMessage::system("Second instruction"),
        ];
        let system = GeminiProvider::extract_system_messages(&messages);
        assert_eq!(system, Some("First instruction\n\nSecond instruction".to_string()));
    }

    #[tokio::test]
    async fn test_chat_completion_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                mockito::Matcher::Regex(r"^/models/gemini-2\.0-flash:generateContent.*$".to_string()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"grounded"}]}}],"usageMetadata":{"promptTokenCount":8,"candidatesTokenCount":2}}"#,
            )
            .create_async()
            .await;

        let provider =
            GeminiProvider::with_api_key("gemini-2.0-flash".to_string(), "k".to_string())
                .with_base_url(server.url());
        let reply = provider.generate_text("ping", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.content, "grounded");
        assert_eq!(reply.usage.unwrap().total_tokens, 10);
    }
}
