//! TOML configuration for the orchestration subsystem.
//!
//! A single file configures routing chains, provider timeouts, pricing, the
//! response cache, citation validation, the classifier keyword table, and
//! background-task retention. Every section has workable defaults so a
//! minimal file (or none at all) still yields a running system.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::pricing::PricingTable;
use super::types::{RoutingTable, TaskClassification};
use crate::citations::{ValidationConfig, ValidationMode};
use crate::classifier::{KeywordSpec, KeywordTable};
use vantage_providers::{ProviderConfig, ResponseCacheConfig};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrchestratorConfig {
    /// Routing chains and last-resort provider.
    #[serde(default)]
    pub routing: RoutingSection,

    /// Per-provider timeouts.
    #[serde(default)]
    pub providers: ProvidersSection,

    /// Per-model pricing.
    #[serde(default)]
    pub pricing: PricingSection,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheSection,

    /// Citation validation settings.
    #[serde(default)]
    pub citations: CitationsSection,

    /// Classifier keyword table.
    #[serde(default)]
    pub classifier: ClassifierSection,

    /// Background task settings.
    #[serde(default)]
    pub tasks: TasksSection,
}

/// `[routing]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection {
    /// Provider spec appended to every chain as the final candidate.
    #[serde(default = "default_last_resort")]
    pub last_resort: String,

    /// Ordering used for classifications without an explicit chain.
    #[serde(default = "default_chain")]
    pub default: Vec<String>,

    /// Explicit chains per task classification name.
    #[serde(default)]
    pub chains: HashMap<String, Vec<String>>,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            last_resort: default_last_resort(),
            default: default_chain(),
            chains: HashMap::new(),
        }
    }
}

fn default_last_resort() -> String {
    "anthropic:claude-haiku-4-5".to_string()
}

fn default_chain() -> Vec<String> {
    vec!["anthropic:claude-sonnet-4-5".to_string(), "openai:gpt-4o".to_string()]
}

/// `[providers]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersSection {
    /// Timeout applied when a backend has no explicit entry.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Per-backend timeout overrides (backend name -> milliseconds).
    #[serde(default)]
    pub timeouts: HashMap<String, u64>,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self { default_timeout_ms: default_timeout_ms(), timeouts: HashMap::new() }
    }
}

fn default_timeout_ms() -> u64 {
    20_000
}

/// `[pricing]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingSection {
    /// Characters per token when estimating usage.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,

    /// Explicit rates: model id -> [input $/1M, output $/1M].
    #[serde(default)]
    pub models: HashMap<String, [f64; 2]>,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self { chars_per_token: default_chars_per_token(), models: HashMap::new() }
    }
}

fn default_chars_per_token() -> u32 {
    4
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Entry TTL in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum entries held at once.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Classifications whose results may be served from the cache.
    #[serde(default = "default_cacheable")]
    pub cacheable: Vec<String>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
            cacheable: default_cacheable(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    1024
}

fn default_cacheable() -> Vec<String> {
    vec!["summarization".to_string(), "chat".to_string(), "grounded_search".to_string()]
}

/// `[citations]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CitationsSection {
    /// Minimum overlap score for a claim to count as supported.
    #[serde(default = "default_citation_threshold")]
    pub threshold: f64,

    /// "strict" removes unsupported claims, "permissive" flags them.
    #[serde(default = "default_citation_mode")]
    pub mode: String,
}

impl Default for CitationsSection {
    fn default() -> Self {
        Self { threshold: default_citation_threshold(), mode: default_citation_mode() }
    }
}

fn default_citation_threshold() -> f64 {
    0.6
}

fn default_citation_mode() -> String {
    "strict".to_string()
}

/// `[classifier]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
    /// Agent chosen when no keywords match.
    #[serde(default = "default_agent")]
    pub default_agent: String,

    /// Fixed priority order for score ties.
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,

    /// Keywords per agent; entries are `"term"` or `"term:weight"`.
    #[serde(default = "default_keywords")]
    pub keywords: HashMap<String, Vec<String>>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            default_agent: default_agent(),
            priority: default_priority(),
            keywords: default_keywords(),
        }
    }
}

fn default_agent() -> String {
    "chat".to_string()
}

fn default_priority() -> Vec<String> {
    ["dashboard", "battlecard", "comparison", "discovery", "research", "news", "chat"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_keywords() -> HashMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 7] = [
        ("dashboard", &["threat", "summary", "overview", "dashboard", "top"]),
        ("discovery", &["find", "discover", "new competitors", "identify"]),
        ("battlecard", &["battlecard:2", "battle card:2", "objection", "sales"]),
        ("news", &["news", "recent", "latest", "announcement"]),
        ("comparison", &["compare", "comparison", "versus", "vs", "feature"]),
        ("research", &["research", "profile", "deep dive", "tell me about"]),
        ("chat", &["question", "help"]),
    ];
    entries
        .into_iter()
        .map(|(agent, words)| {
            (agent.to_string(), words.iter().map(ToString::to_string).collect())
        })
        .collect()
}

/// `[tasks]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TasksSection {
    /// How long finished tasks are retained before purging, in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for TasksSection {
    fn default() -> Self {
        Self { retention_secs: default_retention_secs() }
    }
}

fn default_retention_secs() -> u64 {
    3600
}

impl OrchestratorConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` if the content cannot be parsed or validated.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration without building anything.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        // Every spec must parse, chain keys must be real classifications.
        parse_spec(&self.routing.last_resort)?;
        for spec in &self.routing.default {
            parse_spec(spec)?;
        }
        for (name, chain) in &self.routing.chains {
            let classification = parse_classification(name)?;
            if chain.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Routing chain for '{}' must have at least one provider",
                    classification
                )));
            }
            for spec in chain {
                parse_spec(spec)?;
            }
        }

        for name in &self.cache.cacheable {
            parse_classification(name)?;
        }

        if !(0.0..=1.0).contains(&self.citations.threshold) {
            return Err(ConfigError::Validation(format!(
                "Citation threshold {} must be between 0.0 and 1.0",
                self.citations.threshold
            )));
        }
        if ValidationMode::from_str(&self.citations.mode).is_none() {
            return Err(ConfigError::Validation(format!(
                "Invalid citation mode: {}. Valid options: strict, permissive",
                self.citations.mode
            )));
        }

        if self.classifier.keywords.is_empty() {
            return Err(ConfigError::Validation(
                "Classifier must configure at least one agent keyword set".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds the routing table, appending the last-resort provider to every
    /// chain.
    ///
    /// # Errors
    /// Returns `ConfigError` if any spec fails to parse.
    pub fn routing_table(&self) -> Result<RoutingTable> {
        let last_resort = parse_spec(&self.routing.last_resort)?;

        let mut default_chain = Vec::new();
        for spec in &self.routing.default {
            default_chain.push(parse_spec(spec)?);
        }

        let mut chains = HashMap::new();
        for (name, chain_specs) in &self.routing.chains {
            let classification = parse_classification(name)?;
            let mut chain = Vec::new();
            for spec in chain_specs {
                chain.push(parse_spec(spec)?);
            }
            chains.insert(classification, chain);
        }

        Ok(RoutingTable::new(chains, default_chain, last_resort))
    }

    /// The cache configuration.
    #[must_use]
    pub fn cache_config(&self) -> ResponseCacheConfig {
        ResponseCacheConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            max_entries: self.cache.max_entries,
        }
    }

    /// The set of classifications whose results may be cached.
    ///
    /// # Errors
    /// Returns `ConfigError` if a name is not a classification.
    pub fn cacheable_set(&self) -> Result<HashSet<TaskClassification>> {
        self.cache.cacheable.iter().map(|name| parse_classification(name)).collect()
    }

    /// The citation validation configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if the mode name is invalid.
    pub fn validation_config(&self) -> Result<ValidationConfig> {
        let mode = ValidationMode::from_str(&self.citations.mode).ok_or_else(|| {
            ConfigError::Validation(format!("Invalid citation mode: {}", self.citations.mode))
        })?;
        Ok(ValidationConfig { threshold: self.citations.threshold, mode })
    }

    /// The classifier keyword table.
    #[must_use]
    pub fn keyword_table(&self) -> KeywordTable {
        let keywords = self
            .classifier
            .keywords
            .iter()
            .map(|(agent, terms)| {
                (agent.clone(), terms.iter().map(|t| KeywordSpec::parse(t)).collect())
            })
            .collect();
        KeywordTable::new(
            keywords,
            self.classifier.priority.clone(),
            self.classifier.default_agent.clone(),
        )
    }

    /// The pricing table.
    #[must_use]
    pub fn pricing_table(&self) -> PricingTable {
        let rates = self
            .pricing
            .models
            .iter()
            .map(|(model, [input, output])| (model.clone(), (*input, *output)))
            .collect();
        PricingTable::new(rates, self.pricing.chars_per_token)
    }

    /// Per-backend timeouts and the default.
    #[must_use]
    pub fn timeouts(&self) -> (Duration, HashMap<String, Duration>) {
        let default = Duration::from_millis(self.providers.default_timeout_ms);
        let overrides = self
            .providers
            .timeouts
            .iter()
            .map(|(name, ms)| (name.clone(), Duration::from_millis(*ms)))
            .collect();
        (default, overrides)
    }

    /// How long finished background tasks are retained.
    #[must_use]
    pub fn task_retention(&self) -> Duration {
        Duration::from_secs(self.tasks.retention_secs)
    }
}

fn parse_spec(spec: &str) -> Result<ProviderConfig> {
    ProviderConfig::from_spec(spec).map_err(|e| ConfigError::Validation(e.to_string()))
}

fn parse_classification(name: &str) -> Result<TaskClassification> {
    TaskClassification::from_str(name).ok_or_else(|| {
        ConfigError::Validation(format!(
            "Unknown task classification '{}'. Valid options: {}",
            name,
            TaskClassification::ALL.map(|c| c.to_string()).join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[routing]
last_resort = "mock:fallback"
default = ["mock:primary", "mock:secondary"]

[routing.chains]
complex_analysis = ["anthropic:claude-sonnet-4-5", "openai:gpt-4o"]
bulk_extraction = ["openai:gpt-4o-mini"]

[providers]
default_timeout_ms = 15000

[providers.timeouts]
anthropic = 30000

[pricing.models]
"claude-sonnet-4-5" = [3.0, 15.0]

[cache]
ttl_secs = 120
max_entries = 64
cacheable = ["summarization"]

[citations]
threshold = 0.7
mode = "permissive"

[tasks]
retention_secs = 600
"#
        )
        .unwrap();

        let config = OrchestratorConfig::load(file.path()).unwrap();
        assert_eq!(config.routing.chains.len(), 2);

        let table = config.routing_table().unwrap();
        let chain = table.candidates(TaskClassification::ComplexAnalysis);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.last().unwrap().spec(), "mock:fallback");

        let (default_timeout, overrides) = config.timeouts();
        assert_eq!(default_timeout, Duration::from_millis(15_000));
        assert_eq!(overrides["anthropic"], Duration::from_millis(30_000));

        assert_eq!(config.cache_config().ttl, Duration::from_secs(120));
        assert_eq!(
            config.cacheable_set().unwrap(),
            HashSet::from([TaskClassification::Summarization])
        );

        let validation = config.validation_config().unwrap();
        assert_eq!(validation.mode, ValidationMode::Permissive);
        assert_eq!(config.task_retention(), Duration::from_secs(600));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.routing_table().is_ok());
        assert!(config.validation_config().is_ok());
        assert_eq!(config.keyword_table().default_agent, "chat");
        assert_eq!(config.keyword_table().keywords.len(), 7);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config.providers.default_timeout_ms, 20_000);
    }

    #[test]
    fn test_rejects_unknown_classification() {
        let result = OrchestratorConfig::from_toml_str(
            r#"
[routing.chains]
fancy_reasoning = ["mock:a"]
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_empty_chain() {
        let result = OrchestratorConfig::from_toml_str(
            r#"
[routing.chains]
chat = []
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_bad_spec() {
        let result = OrchestratorConfig::from_toml_str(
            r#"
[routing]
last_resort = "not-a-spec"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_bad_citation_mode() {
        let result = OrchestratorConfig::from_toml_str(
            r#"
[citations]
mode = "lenient"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let result = OrchestratorConfig::from_toml_str(
            r#"
[citations]
threshold = 1.5
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_weighted_keyword_parsing() {
        let config = OrchestratorConfig::default();
        let table = config.keyword_table();
        let battlecard = &table.keywords["battlecard"];
        assert!(battlecard.iter().any(|k| k.term == "battlecard" && (k.weight - 2.0).abs() < f64::EPSILON));
    }
}
