//! Product comparison agent.
//!
//! Produces a structured feature matrix alongside the narrative, so calls
//! request a JSON payload and are classified as complex analysis.

use async_trait::async_trait;
use std::time::Instant;

use super::{build_response, prompts};
use crate::citations::{SourceKind, ValidationOutcome, validate};
use crate::error::Result;
use crate::retrieval::RetrievalFilters;
use crate::routing::{TaskClassification, extract_json};
use crate::{Agent, AgentContext, AgentResponse};
use vantage_abstraction::GenerationParameters;

const SPECIALTY: &str = "You compare products feature by feature. Respond with a JSON object of \
the form {\"matrix\": [{\"feature\": \"...\", \"ours\": \"...\", \"theirs\": \"...\"}], \
\"summary\": \"two or three sentences\"}. Mark a cell \"unknown\" when the evidence is silent.";

/// Compares products and features across competitors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComparisonAgent;

impl ComparisonAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for ComparisonAgent {
    fn id(&self) -> &str {
        "comparison"
    }

    fn description(&self) -> &str {
        "Feature-level product comparisons with a structured matrix"
    }

    async fn handle(&self, query: &str, context: &AgentContext) -> Result<AgentResponse> {
        let started = Instant::now();

        let filters = RetrievalFilters {
            kinds: vec![SourceKind::Product, SourceKind::Competitor],
            entity_id: None,
            limit: Some(10),
        };
        let evidence = context.retriever.retrieve(query, &filters).await?;

        let options = context
            .route_options(self.id())
            .with_system_prompt(prompts::system_prompt(SPECIALTY))
            .with_parameters(GenerationParameters {
                temperature: Some(0.2),
                max_tokens: Some(1200),
                ..Default::default()
            })
            .structured();

        let result = context
            .router
            .route(
                &prompts::user_prompt(query, &evidence),
                TaskClassification::ComplexAnalysis,
                options,
            )
            .await?;

        let payload = extract_json(&result.content).unwrap_or(serde_json::Value::Null);
        let outcome = match payload.get("summary").and_then(|s| s.as_str()) {
            Some(summary) => validate(summary, &evidence, &context.validation),
            None => ValidationOutcome {
                text: String::new(),
                citations: Vec::new(),
                rejected: Vec::new(),
            },
        };

        Ok(build_response(self.id(), outcome, payload, &result, started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing;
    use crate::citations::{EvidenceSnippet, ValidationConfig, ValidationMode};

    #[tokio::test]
    async fn test_matrix_payload_is_preserved() {
        let content = r#"{"matrix": [{"feature": "SSO", "ours": "yes", "theirs": "unknown"}],
"summary": "Acme Pro supports SSO"}"#;
        let context = testing::context_with(
            content,
            vec![EvidenceSnippet::new("product-5", SourceKind::Product, "Acme Pro supports SSO")],
            ValidationConfig { threshold: 0.6, mode: ValidationMode::Strict },
        );

        let response =
            ComparisonAgent::new().handle("compare us to Acme", &context).await.unwrap();
        assert_eq!(response.data["matrix"][0]["feature"], "SSO");
        assert_eq!(response.text, "Acme Pro supports SSO");
        assert_eq!(response.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_summary_yields_empty_text() {
        let context = testing::context_with(
            r#"{"matrix": []}"#,
            Vec::new(),
            ValidationConfig { threshold: 0.6, mode: ValidationMode::Strict },
        );

        let response =
            ComparisonAgent::new().handle("compare us to Acme", &context).await.unwrap();
        assert!(response.text.is_empty());
        assert!(response.citations.is_empty());
    }
}
