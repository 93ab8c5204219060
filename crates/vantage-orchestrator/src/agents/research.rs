//! Deep competitor research agent.

use async_trait::async_trait;
use std::time::Instant;

use super::{build_response, prompts};
use crate::citations::validate;
use crate::error::Result;
use crate::retrieval::RetrievalFilters;
use crate::routing::TaskClassification;
use crate::{Agent, AgentContext, AgentResponse};
use vantage_abstraction::GenerationParameters;

const SPECIALTY: &str = "You write deep competitor profiles: company background, product \
direction, go-to-market motion, and recent momentum. Cover only what the evidence supports and \
organize the profile by topic.";

/// Builds a deep-dive profile of one competitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResearchAgent;

impl ResearchAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn id(&self) -> &str {
        "research"
    }

    fn description(&self) -> &str {
        "Deep competitor profiles across all tracked sources"
    }

    async fn handle(&self, query: &str, context: &AgentContext) -> Result<AgentResponse> {
        let started = Instant::now();

        // Research pulls from every source kind.
        let filters = RetrievalFilters::default().with_limit(12);
        let evidence = context.retriever.retrieve(query, &filters).await?;

        let options = context
            .route_options(self.id())
            .with_system_prompt(prompts::system_prompt(SPECIALTY))
            .with_parameters(GenerationParameters {
                temperature: Some(0.3),
                max_tokens: Some(1500),
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
    use crate::citations::{EvidenceSnippet, SourceKind, ValidationConfig, ValidationMode};

    #[tokio::test]
    async fn test_profile_draws_on_all_source_kinds() {
        let evidence = vec![
            EvidenceSnippet::new("competitor-1", SourceKind::Competitor, "Globex sells to banks"),
            EvidenceSnippet::new("document-2", SourceKind::Document, "Globex pricing starts high"),
        ];
        let context = testing::context_with(
            "Globex sells to banks. Globex pricing starts high.",
            evidence,
            ValidationConfig { threshold: 0.6, mode: ValidationMode::Strict },
        );

        let response = ResearchAgent::new().handle("profile Globex", &context).await.unwrap();
        assert_eq!(response.citations.len(), 2);
        assert_eq!(response.data["evidence_count"], 2);
    }
}
