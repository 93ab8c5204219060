//! News digest agent.

use async_trait::async_trait;
use std::time::Instant;

use super::{build_response, prompts};
use crate::citations::{SourceKind, validate};
use crate::error::Result;
use crate::retrieval::RetrievalFilters;
use crate::routing::TaskClassification;
use crate::{Agent, AgentContext, AgentResponse};
use vantage_abstraction::GenerationParameters;

const SPECIALTY: &str = "You digest competitor news. Report only what the evidence says \
happened, most significant items first, with dates when the evidence gives them.";

/// Digests recent news items about tracked competitors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewsAgent;

impl NewsAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for NewsAgent {
    fn id(&self) -> &str {
        "news"
    }

    fn description(&self) -> &str {
        "Competitor news digests grounded in tracked items"
    }

    async fn handle(&self, query: &str, context: &AgentContext) -> Result<AgentResponse> {
        let started = Instant::now();

        let filters = RetrievalFilters::for_kind(SourceKind::News).with_limit(10);
        let evidence = context.retriever.retrieve(query, &filters).await?;

        let options = context
            .route_options(self.id())
            .with_system_prompt(prompts::system_prompt(SPECIALTY))
            .with_parameters(GenerationParameters {
                temperature: Some(0.2),
                max_tokens: Some(800),
                ..Default::default()
            });

        let result = context
            .router
            .route(
                &prompts::user_prompt(query, &evidence),
                TaskClassification::GroundedSearch,
                options,
            )
            .await?;

        let outcome = validate(&result.content, &evidence, &context.validation);
        let data = serde_json::json!({
            "evidence_count": evidence.len(),
            "flagged_claims": outcome.rejected.len(),
        });

        Ok(build_response(self.id(), outcome, data, &result, started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing;
    use crate::citations::{EvidenceSnippet, ValidationConfig, ValidationMode};
    use crate::routing::LedgerFilter;

    #[tokio::test]
    async fn test_uses_grounded_search_classification() {
        let context = testing::permissive_context("Nothing new this week.");
        NewsAgent::new().handle("latest news", &context).await.unwrap();

        let filter = LedgerFilter {
            classification: Some(TaskClassification::GroundedSearch),
            ..Default::default()
        };
        assert_eq!(context.router.ledger().query(&filter).len(), 1);
    }

    #[tokio::test]
    async fn test_only_news_evidence_is_considered() {
        let evidence = vec![
            EvidenceSnippet::new("news-4", SourceKind::News, "Initech acquired a data vendor"),
            EvidenceSnippet::new("product-1", SourceKind::Product, "Initech ships an API"),
        ];
        let context = testing::context_with(
            "Initech acquired a data vendor.",
            evidence,
            ValidationConfig { threshold: 0.6, mode: ValidationMode::Strict },
        );

        let response = NewsAgent::new().handle("Initech news", &context).await.unwrap();
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].source_id, "news-4");
        assert_eq!(response.data["evidence_count"], 1);
    }
}
