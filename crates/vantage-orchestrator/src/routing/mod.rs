//! Model routing.
//!
//! Maps a task classification to an ordered provider chain, attempts
//! candidates strictly in sequence with per-provider timeouts, and records
//! every successful call to the cost ledger. One router instance is built at
//! the composition root and shared by every agent.

mod breaker;
mod config;
mod ledger;
mod pricing;
mod router;
mod types;

pub use breaker::{BreakerSnapshot, CircuitState, ProviderBreaker};
pub use config::{ConfigError, OrchestratorConfig};
pub use ledger::{AggregateUsage, CostLedger, CostLedgerEntry, DailyUsage, LedgerFilter};
pub use pricing::PricingTable;
pub use router::{ModelRouter, RouterSettings, extract_json};
pub use types::{
    FailureRecord, ProviderResult, RouteOptions, RoutingError, RoutingTable, TaskClassification,
};
