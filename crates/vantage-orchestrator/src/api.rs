//! Shape-level API surface.
//!
//! The HTTP framework, authentication, and request validation live outside
//! this subsystem; collaborators mount these envelopes on whatever transport
//! they use. `AgentService` is the composition root facade: it owns the
//! shared router, ledger, cache, orchestrator, and task service, and every
//! endpoint's semantics map onto one of its methods.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::citations::{Citation, ValidationConfig};
use crate::error::{ErrorEnvelope, OrchestrationError, TaskError};
use crate::retrieval::Retriever;
use crate::routing::{ConfigError, CostLedger, DailyUsage, ModelRouter, OrchestratorConfig};
use crate::tasks::{BackgroundTaskService, Task};
use crate::{AgentContext, AgentResponse, Orchestrator};
use vantage_providers::ResponseCache;

/// `POST /agents/query` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The natural-language query.
    pub query: String,
    /// The requesting user.
    pub user_id: String,
    /// Optional session correlator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The response envelope returned by query endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Natural-language answer text.
    pub response: String,
    /// The agent that handled the query.
    pub agent: String,
    /// Citations supporting the text.
    pub citations: Vec<Citation>,
    /// Cost of the underlying model call(s) in USD.
    pub cost_usd: f64,
    /// Total tokens consumed.
    pub tokens_used: u32,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Agent-specific structured payload.
    pub data: serde_json::Value,
}

impl From<AgentResponse> for QueryResponse {
    fn from(response: AgentResponse) -> Self {
        Self {
            response: response.text,
            agent: response.agent,
            citations: response.citations,
            cost_usd: response.cost_usd,
            tokens_used: response.tokens_used,
            latency_ms: response.latency_ms,
            data: response.data,
        }
    }
}

/// Per-agent health entry in `GET /agents/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Agent identifier.
    pub id: String,
    /// Agent description.
    pub description: String,
}

/// Per-provider availability entry in `GET /agents/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// The `"kind:model"` provider spec.
    pub provider: String,
    /// Circuit state label: "closed", "open", or "half_open".
    pub state: String,
    /// Failure rate in the current window.
    pub failure_rate: f64,
    /// Whether the provider is currently being routed to.
    pub available: bool,
}

/// `GET /agents/status` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Registered agents.
    pub agents: Vec<AgentStatus>,
    /// Provider availability from the routing table.
    pub providers: Vec<ProviderStatus>,
}

/// `POST /agents/tasks` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSubmitted {
    /// Identifier for polling `GET /agents/tasks/{taskId}`.
    pub task_id: String,
}

/// Composition-root facade over the orchestration subsystem.
///
/// Construct one per process and share it; the router, ledger, and cache it
/// owns are the process-wide instances every caller goes through.
pub struct AgentService {
    orchestrator: Arc<Orchestrator>,
    router: Arc<ModelRouter>,
    retriever: Arc<dyn Retriever>,
    validation: ValidationConfig,
    tasks: Arc<BackgroundTaskService>,
}

impl AgentService {
    /// Builds the full subsystem from configuration: ledger, cache, router,
    /// the seven standard agents, and the background task service.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub async fn from_config(
        config: &OrchestratorConfig,
        retriever: Arc<dyn Retriever>,
    ) -> Result<Self, ConfigError> {
        let ledger = Arc::new(CostLedger::new());
        let cache = Arc::new(
            ResponseCache::new(config.cache_config())
                .map_err(|e| ConfigError::Validation(e.to_string()))?,
        );
        let router = Arc::new(ModelRouter::from_config(config, ledger, cache)?);

        let orchestrator =
            Arc::new(Orchestrator::with_standard_agents(config.keyword_table()).await);
        let tasks = Arc::new(BackgroundTaskService::new(
            Arc::clone(&orchestrator),
            config.task_retention(),
        ));

        Ok(Self {
            orchestrator,
            router,
            retriever,
            validation: config.validation_config()?,
            tasks,
        })
    }

    /// Builds a service from pre-constructed parts (tests inject their own
    /// router and agents here).
    #[must_use]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        router: Arc<ModelRouter>,
        retriever: Arc<dyn Retriever>,
        validation: ValidationConfig,
        tasks: Arc<BackgroundTaskService>,
    ) -> Self {
        Self { orchestrator, router, retriever, validation, tasks }
    }

    /// The shared orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    fn context(&self, user_id: &str, session_id: Option<String>) -> AgentContext {
        AgentContext::new(
            Arc::clone(&self.router),
            Arc::clone(&self.retriever),
            self.validation,
        )
        .with_correlators(Some(user_id.to_string()), session_id)
    }

    /// `POST /agents/query`: classify and execute.
    ///
    /// # Errors
    /// Returns a sanitized `ErrorEnvelope`; internal causes are only logged.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, ErrorEnvelope> {
        let context = self.context(&request.user_id, request.session_id.clone());
        self.orchestrator
            .handle_query(&request.query, &context)
            .await
            .map(QueryResponse::from)
            .map_err(|e| ErrorEnvelope::from_error(&e))
    }

    /// `POST /agents/{agentName}`: execute a specific agent.
    ///
    /// # Errors
    /// Returns a sanitized `ErrorEnvelope`; internal causes are only logged.
    pub async fn query_agent(
        &self,
        agent: &str,
        request: QueryRequest,
    ) -> Result<QueryResponse, ErrorEnvelope> {
        let context = self.context(&request.user_id, request.session_id.clone());
        self.orchestrator
            .execute(agent, &request.query, &context)
            .await
            .map(QueryResponse::from)
            .map_err(|e| ErrorEnvelope::from_error(&e))
    }

    /// `GET /agents/status`: per-agent health and per-provider availability.
    pub async fn status(&self) -> StatusReport {
        let agents = self
            .orchestrator
            .list_agents()
            .await
            .into_iter()
            .map(|metadata| AgentStatus { id: metadata.id, description: metadata.description })
            .collect();

        let providers = self
            .router
            .provider_availability()
            .into_iter()
            .map(|snapshot| ProviderStatus {
                provider: snapshot.provider,
                state: snapshot.state.label().to_string(),
                failure_rate: snapshot.failure_rate,
                available: snapshot.state.label() != "open",
            })
            .collect();

        StatusReport { agents, providers }
    }

    /// `GET /agents/cost`: daily aggregates with per-agent/per-model
    /// breakdowns. Defaults to today (UTC).
    #[must_use]
    pub fn cost(&self, date: Option<NaiveDate>) -> DailyUsage {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        self.router.ledger().daily_usage(date)
    }

    /// `POST /agents/tasks`: submit background work.
    pub async fn submit_task(&self, request: QueryRequest) -> TaskSubmitted {
        let context = self.context(&request.user_id, request.session_id.clone());
        let task_id = self.tasks.submit(request.query, context).await;
        TaskSubmitted { task_id }
    }

    /// `GET /agents/tasks/{taskId}`: poll a background task.
    ///
    /// # Errors
    /// Returns a sanitized `ErrorEnvelope` when the task is unknown.
    pub async fn task(&self, task_id: &str) -> Result<Task, ErrorEnvelope> {
        self.tasks
            .status(task_id)
            .await
            .map_err(|e| ErrorEnvelope::from_error(&OrchestrationError::Task(e)))
    }

    /// `DELETE /agents/tasks/{taskId}`: best-effort cancellation.
    ///
    /// # Errors
    /// Returns a sanitized `ErrorEnvelope` when the task is unknown.
    pub async fn cancel_task(&self, task_id: &str) -> Result<bool, ErrorEnvelope> {
        self.tasks
            .cancel(task_id)
            .await
            .map_err(|e| ErrorEnvelope::from_error(&OrchestrationError::Task(e)))
    }
}

impl std::fmt::Debug for AgentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentService")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
