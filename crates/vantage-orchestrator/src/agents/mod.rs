//! The seven specialist agents.
//!
//! Every agent follows the same shape: pull evidence through the retrieval
//! capability, send a grounded prompt through the shared router under its own
//! task classification, then run the citation validator over the output
//! before returning.

pub mod battlecard;
pub mod chat;
pub mod comparison;
pub mod dashboard;
pub mod discovery;
pub mod news;
pub mod prompts;
pub mod research;

pub use battlecard::BattlecardAgent;
pub use chat::ChatAgent;
pub use comparison::ComparisonAgent;
pub use dashboard::DashboardAgent;
pub use discovery::DiscoveryAgent;
pub use news::NewsAgent;
pub use research::ResearchAgent;

use crate::AgentResponse;
use crate::citations::ValidationOutcome;
use crate::routing::ProviderResult;
use std::time::Instant;

/// Assembles the response envelope from a validated routed call.
pub(crate) fn build_response(
    agent: &str,
    outcome: ValidationOutcome,
    data: serde_json::Value,
    result: &ProviderResult,
    started: Instant,
) -> AgentResponse {
    AgentResponse {
        text: outcome.text,
        citations: outcome.citations,
        agent: agent.to_string(),
        data,
        cost_usd: result.cost_usd,
        latency_ms: started.elapsed().as_millis() as u64,
        tokens_used: result.total_tokens(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::citations::{EvidenceSnippet, ValidationConfig, ValidationMode};
    use crate::routing::{CostLedger, ModelRouter, RouterSettings, RoutingTable};
    use crate::{AgentContext, StaticRetriever};
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use vantage_providers::{
        MockProvider, ProviderConfig, ResponseCache, ResponseCacheConfig,
    };

    /// Context whose router always answers `content` from a mock provider,
    /// with the given evidence corpus and validation settings.
    pub(crate) fn context_with(
        content: &str,
        evidence: Vec<EvidenceSnippet>,
        validation: ValidationConfig,
    ) -> AgentContext {
        let spec = ProviderConfig::from_spec("mock:test").unwrap();
        let table = RoutingTable::new(HashMap::new(), vec![spec.clone()], spec);

        let settings = RouterSettings { cacheable: HashSet::new(), ..Default::default() };
        let router = ModelRouter::new(
            table,
            Arc::new(CostLedger::new()),
            Arc::new(ResponseCache::new(ResponseCacheConfig::default()).unwrap()),
            settings,
        )
        .with_provider(
            "mock:test",
            Arc::new(MockProvider::with_response("mock-test".to_string(), content.to_string(), 40, 20)),
        );

        AgentContext::new(
            Arc::new(router),
            Arc::new(StaticRetriever::new(evidence)),
            validation,
        )
    }

    /// Context with permissive validation and no evidence.
    pub(crate) fn permissive_context(content: &str) -> AgentContext {
        context_with(
            content,
            Vec::new(),
            ValidationConfig { threshold: 0.6, mode: ValidationMode::Permissive },
        )
    }
}
