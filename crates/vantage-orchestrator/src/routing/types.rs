//! Types for the model routing system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use vantage_abstraction::GenerationParameters;
use vantage_providers::ProviderConfig;

/// The nature of a model call, used to pick a provider ordering.
///
/// Assigned by the calling agent per call; each classification maps to an
/// ordered candidate chain in the `RoutingTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClassification {
    /// Quality-critical narrative synthesis.
    ComplexAnalysis,
    /// Many small, cheap extraction calls.
    BulkExtraction,
    /// Conversational back-and-forth.
    Chat,
    /// Answers that must stay close to retrieved evidence.
    GroundedSearch,
    /// Condensing known material.
    Summarization,
}

impl TaskClassification {
    /// All classifications, in a fixed order.
    pub const ALL: [Self; 5] = [
        Self::ComplexAnalysis,
        Self::BulkExtraction,
        Self::Chat,
        Self::GroundedSearch,
        Self::Summarization,
    ];

    /// Parses a classification name.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "complex_analysis" => Some(Self::ComplexAnalysis),
            "bulk_extraction" => Some(Self::BulkExtraction),
            "chat" => Some(Self::Chat),
            "grounded_search" => Some(Self::GroundedSearch),
            "summarization" => Some(Self::Summarization),
            _ => None,
        }
    }
}

impl fmt::Display for TaskClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComplexAnalysis => write!(f, "complex_analysis"),
            Self::BulkExtraction => write!(f, "bulk_extraction"),
            Self::Chat => write!(f, "chat"),
            Self::GroundedSearch => write!(f, "grounded_search"),
            Self::Summarization => write!(f, "summarization"),
        }
    }
}

/// Record of a single failed provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The `"kind:model"` spec of the provider that failed.
    pub provider: String,
    /// Why the attempt failed.
    pub cause: String,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(provider: String, cause: String) -> Self {
        Self { provider, cause }
    }
}

/// Errors from the model router.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Every candidate in the chain failed.
    #[error("All providers failed for task classification '{classification}'")]
    ProviderExhausted {
        /// The classification whose chain was exhausted.
        classification: TaskClassification,
        /// Per-provider failure causes, in attempt order.
        failures: Vec<FailureRecord>,
    },

    /// The routing configuration is invalid.
    #[error("Invalid routing configuration: {0}")]
    InvalidConfig(String),
}

/// The outcome of one successful provider invocation.
///
/// Produced once per `route` call and owned by the call site; the ledger gets
/// its own entry derived from the same numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// The generated content.
    pub content: String,
    /// The model that produced the content.
    pub model_id: String,
    /// The backend name (e.g., "anthropic").
    pub provider: String,
    /// Input token count (reported or estimated).
    pub prompt_tokens: u32,
    /// Output token count (reported or estimated).
    pub completion_tokens: u32,
    /// Derived monetary cost in USD.
    pub cost_usd: f64,
    /// Wall-clock latency of the winning attempt in milliseconds.
    pub latency_ms: u64,
    /// Whether the call succeeded (always true for returned results; kept for
    /// the envelope shape).
    pub success: bool,
    /// Failure cause, when `success` is false.
    pub error: Option<String>,
    /// Whether this result was served from the cache.
    pub cached: bool,
}

impl ProviderResult {
    /// Total tokens across prompt and completion.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Per-call options for `route`.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Generation parameters forwarded to the provider.
    pub parameters: Option<GenerationParameters>,
    /// System-level instructions; sent as a chat completion when present.
    pub system_prompt: Option<String>,
    /// Whether the content must parse as a JSON payload.
    pub expect_structured: bool,
    /// Identity of the calling agent, recorded on the ledger entry.
    pub agent: String,
    /// Optional correlating user identifier.
    pub user_id: Option<String>,
    /// Optional correlating session identifier.
    pub session_id: Option<String>,
    /// Optional correlating domain-entity identifier.
    pub entity_id: Option<String>,
}

impl RouteOptions {
    /// Options for a call issued by the named agent.
    #[must_use]
    pub fn for_agent(agent: impl Into<String>) -> Self {
        Self { agent: agent.into(), ..Default::default() }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the generation parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Requires the response content to parse as JSON.
    #[must_use]
    pub fn structured(mut self) -> Self {
        self.expect_structured = true;
        self
    }
}

/// Ordered provider chains per task classification.
///
/// Loaded from configuration at startup. Every chain is non-empty and ends
/// with the configured last-resort provider; classifications without an
/// explicit chain fall back to the default ordering.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    chains: HashMap<TaskClassification, Vec<ProviderConfig>>,
    default_chain: Vec<ProviderConfig>,
}

impl RoutingTable {
    /// Builds a table, appending `last_resort` to any chain that does not
    /// already end with it. Every chain is therefore non-empty and terminates
    /// with the last resort.
    #[must_use]
    pub fn new(
        mut chains: HashMap<TaskClassification, Vec<ProviderConfig>>,
        mut default_chain: Vec<ProviderConfig>,
        last_resort: ProviderConfig,
    ) -> Self {
        for chain in chains.values_mut() {
            if chain.last() != Some(&last_resort) {
                chain.push(last_resort.clone());
            }
        }
        if default_chain.last() != Some(&last_resort) {
            default_chain.push(last_resort);
        }

        Self { chains, default_chain }
    }

    /// The ordered candidate list for a classification.
    #[must_use]
    pub fn candidates(&self, classification: TaskClassification) -> &[ProviderConfig] {
        self.chains.get(&classification).map_or(&self.default_chain, Vec::as_slice)
    }

    /// Every distinct provider spec named anywhere in the table.
    #[must_use]
    pub fn known_specs(&self) -> Vec<String> {
        let mut specs: Vec<String> = self
            .chains
            .values()
            .flatten()
            .chain(self.default_chain.iter())
            .map(ProviderConfig::spec)
            .collect();
        specs.sort();
        specs.dedup();
        specs
    }
}
