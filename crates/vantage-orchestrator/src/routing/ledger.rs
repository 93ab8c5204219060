//! Append-only cost ledger.
//!
//! Every successful model invocation produces exactly one entry. Entries are
//! never mutated after creation; concurrent writers append behind a single
//! lock so no entry is lost.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::types::TaskClassification;

/// One recorded model invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedgerEntry {
    /// The agent that issued the call.
    pub agent: String,
    /// The model that served it.
    pub model_id: String,
    /// The backend name.
    pub provider: String,
    /// The task classification of the call.
    pub classification: TaskClassification,
    /// Input token count.
    pub prompt_tokens: u32,
    /// Output token count.
    pub completion_tokens: u32,
    /// Derived monetary cost in USD.
    pub cost_usd: f64,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: u64,
    /// When the call completed.
    pub timestamp: DateTime<Utc>,
    /// Optional correlating user identifier.
    pub user_id: Option<String>,
    /// Optional correlating session identifier.
    pub session_id: Option<String>,
    /// Optional correlating domain-entity identifier.
    pub entity_id: Option<String>,
}

/// Filters for `CostLedger::query`.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    /// Only entries from this agent.
    pub agent: Option<String>,
    /// Only entries served by this model.
    pub model_id: Option<String>,
    /// Only entries with this classification.
    pub classification: Option<TaskClassification>,
    /// Only entries at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only entries strictly before this instant.
    pub until: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    fn matches(&self, entry: &CostLedgerEntry) -> bool {
        self.agent.as_ref().is_none_or(|a| &entry.agent == a)
            && self.model_id.as_ref().is_none_or(|m| &entry.model_id == m)
            && self.classification.is_none_or(|c| entry.classification == c)
            && self.since.is_none_or(|t| entry.timestamp >= t)
            && self.until.is_none_or(|t| entry.timestamp < t)
    }
}

/// Aggregated usage for one agent or model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateUsage {
    /// Number of requests.
    pub request_count: u64,
    /// Total tokens across prompt and completion.
    pub total_tokens: u64,
    /// Total cost in USD.
    pub cost_usd: f64,
}

/// Daily aggregate across the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    /// The UTC date this aggregate covers.
    pub date: NaiveDate,
    /// Number of requests that day.
    pub request_count: u64,
    /// Total tokens that day.
    pub total_tokens: u64,
    /// Total cost that day in USD.
    pub total_cost_usd: f64,
    /// Per-agent breakdown.
    pub by_agent: HashMap<String, AggregateUsage>,
    /// Per-model breakdown.
    pub by_model: HashMap<String, AggregateUsage>,
}

/// Append-only record store of model invocations.
///
/// Shared process-wide; `record` never rejects a well-formed entry. Budget
/// policy is the caller's concern — the ledger only reports.
#[derive(Debug, Default)]
pub struct CostLedger {
    entries: RwLock<Vec<CostLedgerEntry>>,
}

impl CostLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: CostLedgerEntry) {
        debug!(
            agent = %entry.agent,
            model_id = %entry.model_id,
            classification = %entry.classification,
            cost_usd = entry.cost_usd,
            latency_ms = entry.latency_ms,
            "Recording ledger entry"
        );
        let mut entries = self.entries.write().expect("Ledger lock poisoned");
        entries.push(entry);
    }

    /// Returns entries matching the filter, in append order.
    #[must_use]
    pub fn query(&self, filter: &LedgerFilter) -> Vec<CostLedgerEntry> {
        let entries = self.entries.read().expect("Ledger lock poisoned");
        entries.iter().filter(|e| filter.matches(e)).cloned().collect()
    }

    /// Aggregates total cost, request count, and per-agent/per-model
    /// breakdowns for a UTC date.
    #[must_use]
    pub fn daily_usage(&self, date: NaiveDate) -> DailyUsage {
        let entries = self.entries.read().expect("Ledger lock poisoned");

        let mut usage = DailyUsage {
            date,
            request_count: 0,
            total_tokens: 0,
            total_cost_usd: 0.0,
            by_agent: HashMap::new(),
            by_model: HashMap::new(),
        };

        for entry in entries.iter().filter(|e| e.timestamp.date_naive() == date) {
            let tokens = u64::from(entry.prompt_tokens) + u64::from(entry.completion_tokens);

            usage.request_count += 1;
            usage.total_tokens += tokens;
            usage.total_cost_usd += entry.cost_usd;

            let agent = usage.by_agent.entry(entry.agent.clone()).or_default();
            agent.request_count += 1;
            agent.total_tokens += tokens;
            agent.cost_usd += entry.cost_usd;

            let model = usage.by_model.entry(entry.model_id.clone()).or_default();
            model.request_count += 1;
            model.total_tokens += tokens;
            model.cost_usd += entry.cost_usd;
        }

        usage
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("Ledger lock poisoned").len()
    }

    /// Whether the ledger holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
