//! Provider factory for creating client instances from configuration.
//!
//! This module provides functionality to create provider instances based on
//! configuration, handling API key loading from environment variables and the
//! `"kind:model"` specification format used in routing configuration.

use crate::{ClaudeProvider, GeminiProvider, MockProvider, OpenAiProvider};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};
use vantage_abstraction::{Provider, ProviderError};

/// Provider backend enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Mock provider for testing.
    Mock,
    /// Anthropic Claude models.
    Claude,
    /// Google Gemini models.
    Gemini,
    /// OpenAI models.
    OpenAi,
}

impl FromStr for ProviderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "claude" | "anthropic" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Claude => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Provider client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// The backend to create a client for.
    pub kind: ProviderKind,
    /// The model ID (e.g., "claude-sonnet-4-5", "gpt-4o-mini").
    pub model_id: String,
    /// Optional API key (if not provided, will be loaded from environment).
    pub api_key: Option<String>,
    /// Optional base URL override (used by tests against a local HTTP mock).
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Creates a new `ProviderConfig` with the given kind and model ID.
    #[must_use]
    pub fn new(kind: ProviderKind, model_id: String) -> Self {
        Self { kind, model_id, api_key: None, base_url: None }
    }

    /// Sets the API key for this configuration.
    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets the base URL override for this configuration.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Parses a `"kind:model"` specification (e.g., "anthropic:claude-sonnet-4-5").
    ///
    /// # Errors
    /// Returns a `ProviderError` if the specification is malformed or names an
    /// unknown backend.
    pub fn from_spec(spec: &str) -> Result<Self, ProviderError> {
        let Some((kind_str, model_id)) = spec.split_once(':') else {
            return Err(ProviderError::UnsupportedProvider(format!(
                "Invalid provider spec '{}', expected 'kind:model'",
                spec
            )));
        };

        if model_id.is_empty() || model_id.contains(':') {
            return Err(ProviderError::UnsupportedProvider(format!(
                "Invalid provider spec '{}', expected 'kind:model'",
                spec
            )));
        }

        let kind = ProviderKind::from_str(kind_str).map_err(|()| {
            ProviderError::UnsupportedProvider(format!(
                "Unknown backend '{}' in provider spec '{}'",
                kind_str, spec
            ))
        })?;

        Ok(Self::new(kind, model_id.to_string()))
    }

    /// Renders this configuration back to `"kind:model"` form.
    #[must_use]
    pub fn spec(&self) -> String {
        format!("{}:{}", self.kind, self.model_id)
    }
}

/// Factory for creating provider instances.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates a provider instance from the given configuration.
    ///
    /// Mock model IDs beginning with `fail` produce a provider that always
    /// errors, which routing tests use to script fallback chains.
    ///
    /// # Errors
    /// Returns a `ProviderError` if client creation fails (e.g., missing API key).
    pub fn create(config: ProviderConfig) -> Result<Arc<dyn Provider + Send + Sync>, ProviderError> {
        debug!(
            kind = %config.kind,
            model_id = %config.model_id,
            "Creating provider instance"
        );

        match config.kind {
            ProviderKind::Mock => {
                let provider = if config.model_id.starts_with("fail") {
                    MockProvider::failing(config.model_id, "scripted mock failure")
                } else {
                    MockProvider::new(config.model_id)
                };
                Ok(Arc::new(provider))
            }
            ProviderKind::Claude => {
                let mut provider = if let Some(api_key) = config.api_key {
                    ClaudeProvider::with_api_key(config.model_id, api_key)
                } else {
                    ClaudeProvider::new(config.model_id)?
                };
                if let Some(base_url) = config.base_url {
                    provider = provider.with_base_url(base_url);
                }
                Ok(Arc::new(provider))
            }
            ProviderKind::Gemini => {
                let mut provider = if let Some(api_key) = config.api_key {
                    GeminiProvider::with_api_key(config.model_id, api_key)
                } else {
                    GeminiProvider::new(config.model_id)?
                };
                if let Some(base_url) = config.base_url {
                    provider = provider.with_base_url(base_url);
                }
                Ok(Arc::new(provider))
            }
            ProviderKind::OpenAi => {
                let mut provider = if let Some(api_key) = config.api_key {
                    OpenAiProvider::with_api_key(config.model_id, api_key)
                } else {
                    OpenAiProvider::new(config.model_id)?
                };
                if let Some(base_url) = config.base_url {
                    provider = provider.with_base_url(base_url);
                }
                Ok(Arc::new(provider))
            }
        }
    }

    /// Creates a provider instance from a `"kind:model"` specification.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the spec is unrecognized or creation fails.
    pub fn create_from_spec(spec: &str) -> Result<Arc<dyn Provider + Send + Sync>, ProviderError> {
        let config = ProviderConfig::from_spec(spec).inspect_err(|_| {
            error!(spec = %spec, "Unrecognized provider spec");
        })?;
        Self::create(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(ProviderKind::from_str("mock"), Ok(ProviderKind::Mock));
        assert_eq!(ProviderKind::from_str("Mock"), Ok(ProviderKind::Mock));
        assert_eq!(ProviderKind::from_str("claude"), Ok(ProviderKind::Claude));
        assert_eq!(ProviderKind::from_str("anthropic"), Ok(ProviderKind::Claude));
        assert_eq!(ProviderKind::from_str("ANTHROPIC"), Ok(ProviderKind::Claude));
        assert_eq!(ProviderKind::from_str("gemini"), Ok(ProviderKind::Gemini));
        assert_eq!(ProviderKind::from_str("openai"), Ok(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::from_str("unknown"), Err(()));
    }

    #[test]
    fn test_from_spec() {
        let config = ProviderConfig::from_spec("anthropic:claude-sonnet-4-5").unwrap();
        assert_eq!(config.kind, ProviderKind::Claude);
        assert_eq!(config.model_id, "claude-sonnet-4-5");
        assert_eq!(config.spec(), "anthropic:claude-sonnet-4-5");
    }

    #[test]
    fn test_from_spec_rejects_malformed() {
        assert!(ProviderConfig::from_spec("no-colon").is_err());
        assert!(ProviderConfig::from_spec("mock:").is_err());
        assert!(ProviderConfig::from_spec("mock:a:b").is_err());
        assert!(ProviderConfig::from_spec("nope:model").is_err());
    }

    #[test]
    fn test_factory_create_mock() {
        let config = ProviderConfig::new(ProviderKind::Mock, "test-mock".to_string());
        let provider = ProviderFactory::create(config).unwrap();
        assert_eq!(provider.model_id(), "test-mock");
        assert_eq!(provider.provider_name(), "mock");
    }

    #[tokio::test]
    async fn test_factory_mock_fail_prefix() {
        let provider = ProviderFactory::create_from_spec("mock:fail-a").unwrap();
        let result = provider.generate_text("anything", None).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_factory_create_claude_with_api_key() {
        let config = ProviderConfig::new(ProviderKind::Claude, "claude-sonnet-4-5".to_string())
            .with_api_key("test-api-key".to_string());
        let provider = ProviderFactory::create(config).unwrap();
        assert_eq!(provider.model_id(), "claude-sonnet-4-5");
        assert_eq!(provider.provider_name(), "anthropic");
    }
}
