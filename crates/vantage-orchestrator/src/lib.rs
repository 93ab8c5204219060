//! AI-request orchestration for Vantage.
//!
//! This crate classifies incoming queries to specialist agents, routes their
//! model calls across interchangeable providers with fallback, validates
//! generated claims against retrieved evidence, and tracks cost and latency
//! for every call.

pub mod agents;
pub mod api;
pub mod citations;
pub mod classifier;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod retrieval;
pub mod routing;
pub mod tasks;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

pub use agents::{
    BattlecardAgent, ChatAgent, ComparisonAgent, DashboardAgent, DiscoveryAgent, NewsAgent,
    ResearchAgent,
};
pub use api::AgentService;
pub use citations::{Citation, EvidenceSnippet, SourceKind, ValidationConfig, ValidationMode};
pub use classifier::{Classification, KeywordSpec, KeywordTable, QueryClassifier};
pub use error::{ErrorEnvelope, ErrorKind, OrchestrationError, TaskError};
pub use metrics::{MetricsSink, NoopMetrics};
pub use registry::{AgentMetadata, AgentRegistry};
pub use retrieval::{RetrievalFilters, Retriever, StaticRetriever};
pub use routing::{
    CostLedger, CostLedgerEntry, DailyUsage, ModelRouter, OrchestratorConfig, ProviderResult,
    RouteOptions, RoutingError, TaskClassification,
};
pub use tasks::{BackgroundTaskService, Task, TaskStatus};

/// Everything an agent needs to handle one query.
///
/// The router, retriever, and validation settings are shared process-wide;
/// the correlators vary per request.
#[derive(Clone)]
pub struct AgentContext {
    /// The shared model router.
    pub router: Arc<ModelRouter>,
    /// The externally supplied retrieval capability.
    pub retriever: Arc<dyn Retriever>,
    /// Citation validation settings.
    pub validation: ValidationConfig,
    /// Correlating user identifier, if known.
    pub user_id: Option<String>,
    /// Correlating session identifier, if known.
    pub session_id: Option<String>,
}

impl AgentContext {
    /// Creates a context with no request correlators.
    #[must_use]
    pub fn new(
        router: Arc<ModelRouter>,
        retriever: Arc<dyn Retriever>,
        validation: ValidationConfig,
    ) -> Self {
        Self { router, retriever, validation, user_id: None, session_id: None }
    }

    /// Sets the request correlators.
    #[must_use]
    pub fn with_correlators(
        mut self,
        user_id: Option<String>,
        session_id: Option<String>,
    ) -> Self {
        self.user_id = user_id;
        self.session_id = session_id;
        self
    }

    /// Route options pre-filled with this context's correlators.
    #[must_use]
    pub fn route_options(&self, agent: &str) -> RouteOptions {
        let mut options = RouteOptions::for_agent(agent);
        options.user_id = self.user_id.clone();
        options.session_id = self.session_id.clone();
        options
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// The response envelope every agent produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Natural-language answer text (post citation validation).
    pub text: String,
    /// Citations supporting the text, in claim order.
    pub citations: Vec<Citation>,
    /// The agent that produced the response.
    pub agent: String,
    /// Free-form structured payload (agent-specific).
    pub data: serde_json::Value,
    /// Cost of the underlying model call(s) in USD.
    pub cost_usd: f64,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Total tokens consumed.
    pub tokens_used: u32,
}

/// A specialized handler that turns a domain query into a provider-backed
/// response within one subject area.
///
/// Agents are polymorphic over this capability and selected only via the
/// `Orchestrator`; no agent calls another agent directly.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the unique ID of the agent.
    fn id(&self) -> &str;

    /// Returns a description of the agent's purpose and capabilities.
    fn description(&self) -> &str;

    /// Handles a query within this agent's specialty.
    ///
    /// # Errors
    /// Returns an `OrchestrationError` if routing or retrieval fails.
    async fn handle(&self, query: &str, context: &AgentContext)
    -> error::Result<AgentResponse>;
}

/// Dispatcher that picks an agent for an incoming query and executes it.
///
/// Per query the flow is received -> classified -> executing -> succeeded or
/// failed; classification keeps no state between calls, so within one keyword
/// table snapshot it is deterministic.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    classifier: QueryClassifier,
}

impl Orchestrator {
    /// Creates an orchestrator with the given classifier table.
    #[must_use]
    pub fn new(table: KeywordTable) -> Self {
        Self { registry: Arc::new(AgentRegistry::new()), classifier: QueryClassifier::new(table) }
    }

    /// Creates an orchestrator with the seven standard agents registered.
    pub async fn with_standard_agents(table: KeywordTable) -> Self {
        let orchestrator = Self::new(table);
        orchestrator.register(Arc::new(DashboardAgent::new())).await;
        orchestrator.register(Arc::new(DiscoveryAgent::new())).await;
        orchestrator.register(Arc::new(BattlecardAgent::new())).await;
        orchestrator.register(Arc::new(NewsAgent::new())).await;
        orchestrator.register(Arc::new(ComparisonAgent::new())).await;
        orchestrator.register(Arc::new(ResearchAgent::new())).await;
        orchestrator.register(Arc::new(ChatAgent::new())).await;
        orchestrator
    }

    /// Registers an agent.
    pub async fn register(&self, agent: Arc<dyn Agent>) -> bool {
        self.registry.register(agent).await
    }

    /// Lists registered agents.
    pub async fn list_agents(&self) -> Vec<AgentMetadata> {
        self.registry.list().await
    }

    /// Classifies a query to the best-matching agent.
    #[must_use]
    pub fn classify(&self, query: &str) -> Classification {
        self.classifier.classify(query)
    }

    /// Replaces the classifier keyword table.
    pub fn reload_keywords(&self, table: KeywordTable) {
        self.classifier.reload(table);
    }

    /// Executes a specific agent against a query.
    ///
    /// The returned response is stamped with the executing agent's ID. Full
    /// failure causes are logged here; callers surface only the sanitized
    /// envelope.
    ///
    /// # Errors
    /// Returns an `OrchestrationError` if the agent is unknown or fails.
    pub async fn execute(
        &self,
        agent_id: &str,
        query: &str,
        context: &AgentContext,
    ) -> error::Result<AgentResponse> {
        let agent = self
            .registry
            .get(agent_id)
            .await
            .ok_or_else(|| OrchestrationError::AgentNotFound(agent_id.to_string()))?;

        debug!(agent_id = %agent_id, query_len = query.len(), "Executing agent");

        match agent.handle(query, context).await {
            Ok(mut response) => {
                response.agent = agent_id.to_string();
                info!(
                    agent_id = %agent_id,
                    cost_usd = response.cost_usd,
                    latency_ms = response.latency_ms,
                    citations = response.citations.len(),
                    "Agent execution succeeded"
                );
                Ok(response)
            }
            Err(e) => {
                // Log the full cause chain; the API boundary only ever shows
                // the generic envelope.
                error!(agent_id = %agent_id, error = %e, "Agent execution failed");
                Err(e)
            }
        }
    }

    /// Classifies and executes in one step.
    ///
    /// # Errors
    /// Returns an `OrchestrationError` if execution fails.
    pub async fn handle_query(
        &self,
        query: &str,
        context: &AgentContext,
    ) -> error::Result<AgentResponse> {
        let classification = self.classify(query);
        debug!(
            agent_id = %classification.agent_id,
            score = classification.score,
            defaulted = classification.defaulted,
            "Classified query"
        );
        self.execute(&classification.agent_id, query, context).await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("classifier", &self.classifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing;

    #[tokio::test]
    async fn test_orchestrator_registers_standard_agents() {
        let table = OrchestratorConfig::default().keyword_table();
        let orchestrator = Orchestrator::with_standard_agents(table).await;
        let agents = orchestrator.list_agents().await;
        assert_eq!(agents.len(), 7);
        assert!(agents.iter().any(|a| a.id == "battlecard"));
    }

    #[tokio::test]
    async fn test_execute_unknown_agent() {
        let table = OrchestratorConfig::default().keyword_table();
        let orchestrator = Orchestrator::new(table);
        let context = testing::permissive_context("irrelevant");

        let err = orchestrator.execute("nope", "query", &context).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn test_handle_query_stamps_agent_id() {
        let table = OrchestratorConfig::default().keyword_table();
        let orchestrator = Orchestrator::with_standard_agents(table).await;
        let context = testing::permissive_context("Threat levels are stable this quarter.");

        let response =
            orchestrator.handle_query("Give me a threat overview", &context).await.unwrap();
        assert_eq!(response.agent, "dashboard");
        assert!(response.tokens_used > 0);
    }

    #[tokio::test]
    async fn test_classification_respects_reload() {
        let table = OrchestratorConfig::default().keyword_table();
        let orchestrator = Orchestrator::new(table);
        assert_eq!(orchestrator.classify("threat overview").agent_id, "dashboard");

        let mut keywords = std::collections::HashMap::new();
        keywords.insert("news".to_string(), vec![KeywordSpec::new("threat")]);
        orchestrator.reload_keywords(KeywordTable::new(keywords, vec![], "chat".to_string()));
        assert_eq!(orchestrator.classify("threat overview").agent_id, "news");
    }
}
