//! Conversational agent, the classifier's default fallback.

use async_trait::async_trait;
use std::time::Instant;

use super::{build_response, prompts};
use crate::citations::validate;
use crate::error::Result;
use crate::retrieval::RetrievalFilters;
use crate::routing::TaskClassification;
use crate::{Agent, AgentContext, AgentResponse};
use vantage_abstraction::GenerationParameters;

const SPECIALTY: &str = "You answer general questions about the tracked competitive landscape \
conversationally. Keep answers short and grounded in the evidence.";

/// Answers general questions; selected when no specialist matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatAgent;

impl ChatAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for ChatAgent {
    fn id(&self) -> &str {
        "chat"
    }

    fn description(&self) -> &str {
        "General conversational questions about the landscape"
    }

    async fn handle(&self, query: &str, context: &AgentContext) -> Result<AgentResponse> {
        let started = Instant::now();

        let filters = RetrievalFilters::default().with_limit(4);
        let evidence = context.retriever.retrieve(query, &filters).await?;

        let options = context
            .route_options(self.id())
            .with_system_prompt(prompts::system_prompt(SPECIALTY))
            .with_parameters(GenerationParameters {
                temperature: Some(0.7),
                max_tokens: Some(500),
                ..Default::default()
            });

        let result = context
            .router
            .route(&prompts::user_prompt(query, &evidence), TaskClassification::Chat, options)
            .await?;

        let outcome = validate(&result.content, &evidence, &context.validation);
        let data = serde_json::json!({
            "evidence_count": evidence.len(),
            "flagged_claims": outcome.rejected.len(),
        });

        Ok(build_response(self.id(), outcome, data, &result, started))
    }
}
