//! Competitor discovery agent.
//!
//! Issues many small, cheap extraction calls, so every call is classified as
//! bulk extraction and requests a structured payload.

use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

use super::{build_response, prompts};
use crate::citations::{SourceKind, ValidationOutcome, validate};
use crate::error::Result;
use crate::retrieval::RetrievalFilters;
use crate::routing::{TaskClassification, extract_json};
use crate::{Agent, AgentContext, AgentResponse};
use vantage_abstraction::GenerationParameters;

const SPECIALTY: &str = "You identify competitors mentioned or implied in the evidence. Respond \
with a JSON object of the form {\"competitors\": [{\"name\": \"...\", \"reason\": \"...\"}], \
\"summary\": \"one or two sentences\"}. Include only companies the evidence actually names.";

/// Finds candidate competitors in the evidence corpus.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryAgent;

impl DiscoveryAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for DiscoveryAgent {
    fn id(&self) -> &str {
        "discovery"
    }

    fn description(&self) -> &str {
        "Competitor discovery and candidate extraction"
    }

    async fn handle(&self, query: &str, context: &AgentContext) -> Result<AgentResponse> {
        let started = Instant::now();

        let filters = RetrievalFilters {
            kinds: vec![SourceKind::News, SourceKind::Document],
            entity_id: None,
            limit: Some(12),
        };
        let evidence = context.retriever.retrieve(query, &filters).await?;

        let options = context
            .route_options(self.id())
            .with_system_prompt(prompts::system_prompt(SPECIALTY))
            .with_parameters(GenerationParameters {
                temperature: Some(0.0),
                max_tokens: Some(800),
                ..Default::default()
            })
            .structured();

        let result = context
            .router
            .route(&prompts::user_prompt(query, &evidence), TaskClassification::BulkExtraction, options)
            .await?;

        // Shape validation in the router guarantees a payload is present.
        let payload = extract_json(&result.content).unwrap_or(serde_json::Value::Null);
        let count = payload
            .get("competitors")
            .and_then(|c| c.as_array())
            .map_or(0, Vec::len);
        debug!(agent = %self.id(), candidates = count, "Extracted competitor candidates");

        // Only the natural-language summary goes through the validator; the
        // structured payload is surfaced as-is in `data`.
        let outcome = match payload.get("summary").and_then(|s| s.as_str()) {
            Some(summary) => validate(summary, &evidence, &context.validation),
            None => ValidationOutcome {
                text: format!("Identified {count} candidate competitors."),
                citations: Vec::new(),
                rejected: Vec::new(),
            },
        };

        Ok(build_response(self.id(), outcome, payload, &result, started))
    }
}
