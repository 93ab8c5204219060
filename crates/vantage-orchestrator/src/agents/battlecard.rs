//! Sales battlecard synthesis agent.
//!
//! Battlecards are quality-critical narrative synthesis, so calls are
//! classified as complex analysis and routed to the strongest chain.

use async_trait::async_trait;
use std::time::Instant;

use super::{build_response, prompts};
use crate::citations::{SourceKind, validate};
use crate::error::Result;
use crate::retrieval::RetrievalFilters;
use crate::routing::TaskClassification;
use crate::{Agent, AgentContext, AgentResponse};
use vantage_abstraction::GenerationParameters;

const SPECIALTY: &str = "You write sales battlecards. Structure the answer as: positioning, \
their strengths, their weaknesses, and how to handle the most likely objections. Ground every \
point in the evidence and keep it usable on a sales call.";

/// Synthesizes a sales battlecard for one competitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct BattlecardAgent;

impl BattlecardAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for BattlecardAgent {
    fn id(&self) -> &str {
        "battlecard"
    }

    fn description(&self) -> &str {
        "Sales battlecard synthesis with objection handling"
    }

    async fn handle(&self, query: &str, context: &AgentContext) -> Result<AgentResponse> {
        let started = Instant::now();

        let filters = RetrievalFilters {
            kinds: vec![SourceKind::Competitor, SourceKind::Product, SourceKind::News],
            entity_id: None,
            limit: Some(10),
        };
        let evidence = context.retriever.retrieve(query, &filters).await?;

        let options = context
            .route_options(self.id())
            .with_system_prompt(prompts::system_prompt(SPECIALTY))
            .with_parameters(GenerationParameters {
                temperature: Some(0.4),
                max_tokens: Some(1200),
                ..Default::default()
            });

        let result = context
            .router
            .route(
                &prompts::user_prompt(query, &evidence),
                TaskClassification::ComplexAnalysis,
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
