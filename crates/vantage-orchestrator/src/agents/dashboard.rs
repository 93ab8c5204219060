//! Threat-landscape summarization agent.

use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

use super::{build_response, prompts};
use crate::citations::{SourceKind, validate};
use crate::error::Result;
use crate::retrieval::RetrievalFilters;
use crate::routing::TaskClassification;
use crate::{Agent, AgentContext, AgentResponse};
use vantage_abstraction::GenerationParameters;

const SPECIALTY: &str = "You write the competitive-intelligence dashboard. Summarize the current \
threat landscape across tracked competitors: what changed, which moves matter most, and where \
pressure is building. Keep it under six sentences.";

/// Summarizes the overall threat landscape for the dashboard view.
#[derive(Debug, Default, Clone, Copy)]
pub struct DashboardAgent;

impl DashboardAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for DashboardAgent {
    fn id(&self) -> &str {
        "dashboard"
    }

    fn description(&self) -> &str {
        "Threat landscape summaries and portfolio overviews"
    }

    async fn handle(&self, query: &str, context: &AgentContext) -> Result<AgentResponse> {
        let started = Instant::now();

        let filters = RetrievalFilters {
            kinds: vec![SourceKind::News, SourceKind::Competitor],
            entity_id: None,
            limit: Some(8),
        };
        let evidence = context.retriever.retrieve(query, &filters).await?;
        debug!(agent = %self.id(), evidence = evidence.len(), "Retrieved dashboard evidence");

        let options = context
            .route_options(self.id())
            .with_system_prompt(prompts::system_prompt(SPECIALTY))
            .with_parameters(GenerationParameters {
                temperature: Some(0.3),
                max_tokens: Some(700),
                ..Default::default()
            });

        let result = context
            .router
            .route(&prompts::user_prompt(query, &evidence), TaskClassification::Summarization, options)
            .await?;

        let outcome = validate(&result.content, &evidence, &context.validation);
        let data = serde_json::json!({
            "evidence_count": evidence.len(),
            "flagged_claims": outcome.rejected.len(),
        });

        Ok(build_response(self.id(), outcome, data, &result, started))
    }
}
