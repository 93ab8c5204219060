//! Model router with cost-aware ordering and sequential fallback.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::breaker::{BreakerSnapshot, ProviderBreaker};
use super::config::{ConfigError, OrchestratorConfig};
use super::ledger::{CostLedger, CostLedgerEntry};
use super::pricing::PricingTable;
use super::types::{
    FailureRecord, ProviderResult, RouteOptions, RoutingError, RoutingTable, TaskClassification,
};
use crate::metrics::{MetricsSink, NoopMetrics};
use vantage_abstraction::{ChatMessage, Provider, ProviderError, ProviderReply};
use vantage_providers::{CacheKey, ProviderConfig, ProviderFactory, ResponseCache};

/// Tunables for the router beyond the routing table itself.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Timeout applied when a backend has no explicit entry.
    pub default_timeout: Duration,
    /// Per-backend timeout overrides (backend name -> timeout).
    pub timeouts: HashMap<String, Duration>,
    /// Classifications whose results may be served from and written to the cache.
    pub cacheable: HashSet<TaskClassification>,
    /// Per-model pricing used to derive costs.
    pub pricing: PricingTable,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(20),
            timeouts: HashMap::new(),
            cacheable: HashSet::from([
                TaskClassification::Summarization,
                TaskClassification::Chat,
                TaskClassification::GroundedSearch,
            ]),
            pricing: PricingTable::default(),
        }
    }
}

/// Routes model calls to an ordered chain of providers.
///
/// One instance is constructed at the composition root and shared via `Arc`
/// by every agent; tests build their own isolated instances with injected
/// mock providers. Fallback attempts within one `route` call are strictly
/// sequential; independent `route` calls may run concurrently.
pub struct ModelRouter {
    table: RoutingTable,
    settings: RouterSettings,
    ledger: Arc<CostLedger>,
    cache: Arc<ResponseCache<ProviderResult>>,
    breaker: ProviderBreaker,
    metrics: Arc<dyn MetricsSink>,
    /// Memoized provider clients keyed by spec, so fallback iterations and
    /// concurrent routes share connections.
    providers: RwLock<HashMap<String, Arc<dyn Provider + Send + Sync>>>,
}

impl ModelRouter {
    /// Creates a router over the given table, ledger, and cache.
    #[must_use]
    pub fn new(
        table: RoutingTable,
        ledger: Arc<CostLedger>,
        cache: Arc<ResponseCache<ProviderResult>>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            table,
            settings,
            ledger,
            cache,
            breaker: ProviderBreaker::new(),
            metrics: Arc::new(NoopMetrics),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a router from configuration, sharing the given ledger and cache.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn from_config(
        config: &OrchestratorConfig,
        ledger: Arc<CostLedger>,
        cache: Arc<ResponseCache<ProviderResult>>,
    ) -> Result<Self, ConfigError> {
        let table = config.routing_table()?;
        let (default_timeout, timeouts) = config.timeouts();
        let settings = RouterSettings {
            default_timeout,
            timeouts,
            cacheable: config.cacheable_set()?,
            pricing: config.pricing_table(),
        };
        Ok(Self::new(table, ledger, cache, settings))
    }

    /// Sets the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Pre-seeds a provider instance for a spec (dependency injection for
    /// tests and custom clients).
    #[must_use]
    pub fn with_provider(self, spec: &str, provider: Arc<dyn Provider + Send + Sync>) -> Self {
        self.providers
            .write()
            .expect("Provider map lock poisoned")
            .insert(spec.to_string(), provider);
        self
    }

    /// The cost ledger shared by this router.
    #[must_use]
    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// Availability snapshot for every provider named in the routing table.
    #[must_use]
    pub fn provider_availability(&self) -> Vec<BreakerSnapshot> {
        self.breaker.snapshot(&self.table.known_specs())
    }

    /// Routes a prompt to the candidate chain for `classification`.
    ///
    /// Attempts providers strictly in order; a candidate fails on error,
    /// timeout, or shape violation (empty content, or unparseable payload when
    /// a structured response was requested). Exactly one ledger entry is
    /// written per successful call; failed attempts are never billed.
    ///
    /// # Errors
    /// Returns `RoutingError::ProviderExhausted` with per-provider causes when
    /// every candidate fails.
    pub async fn route(
        &self,
        prompt: &str,
        classification: TaskClassification,
        options: RouteOptions,
    ) -> Result<ProviderResult, RoutingError> {
        let candidates = self.table.candidates(classification);
        let cacheable = self.settings.cacheable.contains(&classification);

        let cache_key = CacheKey::from_request(
            prompt,
            &classification.to_string(),
            options.parameters.as_ref(),
            options.expect_structured,
        );

        if cacheable {
            if let Some(mut hit) = self.cache.get(&cache_key) {
                debug!(
                    classification = %classification,
                    agent = %options.agent,
                    "Serving routed call from cache"
                );
                hit.cached = true;
                return Ok(hit);
            }
        }

        let mut failures: Vec<FailureRecord> = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let spec = candidate.spec();
            let is_last = index == candidates.len() - 1;

            // The last resort is always attempted so an open circuit can never
            // exhaust the chain on its own.
            if !is_last && self.breaker.should_skip(&spec) {
                debug!(provider = %spec, "Skipping provider due to open circuit");
                failures.push(FailureRecord::new(spec, "Skipped: circuit open".to_string()));
                continue;
            }

            let provider = match self.provider_for(candidate) {
                Ok(provider) => provider,
                Err(e) => {
                    warn!(provider = %spec, error = %e, "Provider client creation failed");
                    failures.push(FailureRecord::new(spec, e.to_string()));
                    continue;
                }
            };

            let started = Instant::now();
            match self.attempt(provider.as_ref(), prompt, &options, candidate).await {
                Ok(reply) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    let result = self.finish_success(
                        prompt,
                        classification,
                        &options,
                        candidate,
                        reply,
                        latency_ms,
                    );

                    self.breaker.record(&spec, true);
                    self.metrics.record_call(
                        provider.provider_name(),
                        classification,
                        latency_ms,
                        true,
                    );

                    if cacheable {
                        self.cache.put(cache_key, result.clone());
                    }

                    info!(
                        classification = %classification,
                        provider = %spec,
                        agent = %options.agent,
                        attempt = index + 1,
                        latency_ms,
                        cost_usd = result.cost_usd,
                        "Routed call succeeded"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    warn!(
                        provider = %spec,
                        classification = %classification,
                        error = %e,
                        attempt = index + 1,
                        "Provider attempt failed, trying next candidate"
                    );
                    self.breaker.record(&spec, false);
                    self.metrics.record_call(
                        provider.provider_name(),
                        classification,
                        latency_ms,
                        false,
                    );
                    failures.push(FailureRecord::new(spec, e.to_string()));
                }
            }
        }

        error!(
            classification = %classification,
            agent = %options.agent,
            failures = ?failures,
            "All providers exhausted"
        );
        Err(RoutingError::ProviderExhausted { classification, failures })
    }

    /// One provider attempt under its timeout, with shape validation.
    async fn attempt(
        &self,
        provider: &(dyn Provider + Send + Sync),
        prompt: &str,
        options: &RouteOptions,
        candidate: &ProviderConfig,
    ) -> Result<ProviderReply, ProviderError> {
        let timeout = self.timeout_for(candidate);

        let call = async {
            match &options.system_prompt {
                Some(system) => {
                    let messages =
                        [ChatMessage::system(system.clone()), ChatMessage::user(prompt)];
                    provider.generate_chat_completion(&messages, options.parameters.clone()).await
                }
                None => provider.generate_text(prompt, options.parameters.clone()).await,
            }
        };

        let reply = tokio::time::timeout(timeout, call).await.map_err(|_| {
            ProviderError::Timeout {
                provider: candidate.kind.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
        })??;

        if reply.content.trim().is_empty() {
            return Err(ProviderError::ResponseError("Empty content".to_string()));
        }
        if options.expect_structured && extract_json(&reply.content).is_none() {
            return Err(ProviderError::ResponseError(
                "Response is not a well-formed structured payload".to_string(),
            ));
        }

        Ok(reply)
    }

    /// Builds the result and writes the single ledger entry for a success.
    fn finish_success(
        &self,
        prompt: &str,
        classification: TaskClassification,
        options: &RouteOptions,
        candidate: &ProviderConfig,
        reply: ProviderReply,
        latency_ms: u64,
    ) -> ProviderResult {
        let usage = reply
            .usage
            .unwrap_or_else(|| self.settings.pricing.estimate_usage(prompt, &reply.content));
        let model_id = reply.model_id.unwrap_or_else(|| candidate.model_id.clone());
        let cost_usd = self.settings.pricing.cost(&model_id, usage);

        self.ledger.record(CostLedgerEntry {
            agent: options.agent.clone(),
            model_id: model_id.clone(),
            provider: candidate.kind.to_string(),
            classification,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cost_usd,
            latency_ms,
            timestamp: Utc::now(),
            user_id: options.user_id.clone(),
            session_id: options.session_id.clone(),
            entity_id: options.entity_id.clone(),
        });

        ProviderResult {
            content: reply.content,
            model_id,
            provider: candidate.kind.to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cost_usd,
            latency_ms,
            success: true,
            error: None,
            cached: false,
        }
    }

    fn timeout_for(&self, candidate: &ProviderConfig) -> Duration {
        self.settings
            .timeouts
            .get(&candidate.kind.to_string())
            .copied()
            .unwrap_or(self.settings.default_timeout)
    }

    fn provider_for(
        &self,
        candidate: &ProviderConfig,
    ) -> Result<Arc<dyn Provider + Send + Sync>, ProviderError> {
        let spec = candidate.spec();

        {
            let providers = self.providers.read().expect("Provider map lock poisoned");
            if let Some(provider) = providers.get(&spec) {
                return Ok(Arc::clone(provider));
            }
        }

        let provider = ProviderFactory::create(candidate.clone())?;
        let mut providers = self.providers.write().expect("Provider map lock poisoned");
        let entry = providers.entry(spec).or_insert(provider);
        Ok(Arc::clone(entry))
    }
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("known_providers", &self.table.known_specs().len())
            .field("cacheable", &self.settings.cacheable.len())
            .finish_non_exhaustive()
    }
}

/// Extracts a JSON payload from model output.
///
/// Accepts bare JSON or JSON wrapped in prose/code fences by scanning to the
/// outermost object or array delimiters.
#[must_use]
pub fn extract_json(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Some(value);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::RecordingMetrics;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use vantage_abstraction::GenerationParameters;
    use vantage_providers::{MockProvider, ResponseCacheConfig};

    fn spec(s: &str) -> ProviderConfig {
        ProviderConfig::from_spec(s).unwrap()
    }

    fn table_for(classification: TaskClassification, specs: &[&str]) -> RoutingTable {
        let chain: Vec<ProviderConfig> = specs.iter().map(|s| spec(s)).collect();
        let last = chain.last().unwrap().clone();
        let mut chains = HashMap::new();
        chains.insert(classification, chain.clone());
        RoutingTable::new(chains, chain, last)
    }

    fn router_with(
        classification: TaskClassification,
        specs: &[&str],
        cacheable: bool,
    ) -> ModelRouter {
        let mut settings = RouterSettings::default();
        settings.cacheable = if cacheable {
            HashSet::from([classification])
        } else {
            HashSet::new()
        };
        ModelRouter::new(
            table_for(classification, specs),
            Arc::new(CostLedger::new()),
            Arc::new(ResponseCache::new(ResponseCacheConfig::default()).unwrap()),
            settings,
        )
    }

    #[tokio::test]
    async fn test_fallback_reaches_last_provider() {
        let classification = TaskClassification::ComplexAnalysis;
        let router = router_with(classification, &["mock:fail-a", "mock:fail-b", "mock:c"], false)
            .with_provider(
                "mock:c",
                Arc::new(MockProvider::with_response("mock-c".to_string(), "ok".to_string(), 10, 5)),
            );

        let result = router
            .route("analyze this", classification, RouteOptions::for_agent("battlecard"))
            .await
            .unwrap();

        assert_eq!(result.content, "ok");
        assert_eq!(result.model_id, "mock-c");
        assert_eq!(result.prompt_tokens, 10);
        assert_eq!(result.completion_tokens, 5);
        assert!(result.success);

        // Exactly one ledger entry, for the winning provider.
        assert_eq!(router.ledger().len(), 1);
        let entries = router.ledger().query(&Default::default());
        assert_eq!(entries[0].model_id, "mock-c");
        assert_eq!(entries[0].agent, "battlecard");
    }

    #[tokio::test]
    async fn test_exhausted_chain_bills_nothing() {
        let classification = TaskClassification::Chat;
        let router = router_with(classification, &["mock:fail-a", "mock:fail-b"], false);

        let err = router
            .route("hello", classification, RouteOptions::for_agent("chat"))
            .await
            .unwrap_err();

        match err {
            RoutingError::ProviderExhausted { classification: c, failures } => {
                assert_eq!(c, classification);
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].provider, "mock:fail-a");
            }
            other => panic!("expected ProviderExhausted, got {other:?}"),
        }
        assert!(router.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_cache_round_trip_avoids_second_call() {
        let classification = TaskClassification::Summarization;
        let counting = Arc::new(MockProvider::new("mock-a".to_string()));
        let router = router_with(classification, &["mock:a"], true)
            .with_provider("mock:a", Arc::clone(&counting) as Arc<dyn Provider + Send + Sync>);

        let options = || RouteOptions::for_agent("dashboard");
        let first = router.route("summarize acme", classification, options()).await.unwrap();
        let second = router.route("summarize acme", classification, options()).await.unwrap();

        assert_eq!(counting.call_count(), 1);
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.content, second.content);
        assert_eq!(first.model_id, second.model_id);
        assert_eq!(first.prompt_tokens, second.prompt_tokens);

        // Cache hits are not billed again.
        assert_eq!(router.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_uncacheable_classification_always_calls() {
        let classification = TaskClassification::BulkExtraction;
        let counting = Arc::new(MockProvider::new("mock-a".to_string()));
        let router = router_with(classification, &["mock:a"], false)
            .with_provider("mock:a", Arc::clone(&counting) as Arc<dyn Provider + Send + Sync>);

        let options = || RouteOptions::for_agent("discovery");
        router.route("extract", classification, options()).await.unwrap();
        router.route("extract", classification, options()).await.unwrap();

        assert_eq!(counting.call_count(), 2);
        assert_eq!(router.ledger().len(), 2);
    }

    #[tokio::test]
    async fn test_structured_shape_violation_triggers_fallback() {
        let classification = TaskClassification::BulkExtraction;
        let router = router_with(classification, &["mock:prose", "mock:json"], false)
            .with_provider(
                "mock:prose",
                Arc::new(MockProvider::with_response(
                    "mock-prose".to_string(),
                    "just words, no payload".to_string(),
                    5,
                    5,
                )),
            )
            .with_provider(
                "mock:json",
                Arc::new(MockProvider::with_response(
                    "mock-json".to_string(),
                    r#"{"competitors": ["Acme"]}"#.to_string(),
                    5,
                    5,
                )),
            );

        let result = router
            .route(
                "list competitors",
                classification,
                RouteOptions::for_agent("discovery").structured(),
            )
            .await
            .unwrap();

        assert_eq!(result.model_id, "mock-json");
        assert_eq!(router.ledger().len(), 1);
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        async fn generate_text(
            &self,
            _prompt: &str,
            _parameters: Option<GenerationParameters>,
        ) -> Result<ProviderReply, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ProviderReply { content: "late".to_string(), model_id: None, usage: None })
        }

        async fn generate_chat_completion(
            &self,
            _messages: &[ChatMessage],
            _parameters: Option<GenerationParameters>,
        ) -> Result<ProviderReply, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ProviderReply { content: "late".to_string(), model_id: None, usage: None })
        }

        fn model_id(&self) -> &str {
            "slow-model"
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_provider_failure() {
        let classification = TaskClassification::Chat;
        let mut settings = RouterSettings::default();
        settings.default_timeout = Duration::from_millis(100);
        settings.cacheable = HashSet::new();

        let router = ModelRouter::new(
            table_for(classification, &["mock:slow", "mock:quick"]),
            Arc::new(CostLedger::new()),
            Arc::new(ResponseCache::new(ResponseCacheConfig::default()).unwrap()),
            settings,
        )
        .with_provider("mock:slow", Arc::new(SlowProvider))
        .with_provider("mock:quick", Arc::new(MockProvider::new("mock-quick".to_string())));

        let result = router
            .route("hello", classification, RouteOptions::for_agent("chat"))
            .await
            .unwrap();

        assert_eq!(result.model_id, "mock-quick");
        assert_eq!(router.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_usage_estimated_when_not_reported() {
        struct NoUsageProvider;

        #[async_trait]
        impl Provider for NoUsageProvider {
            async fn generate_text(
                &self,
                _prompt: &str,
                _parameters: Option<GenerationParameters>,
            ) -> Result<ProviderReply, ProviderError> {
                Ok(ProviderReply {
                    content: "eight chars".to_string(),
                    model_id: Some("no-usage".to_string()),
                    usage: None,
                })
            }

            async fn generate_chat_completion(
                &self,
                _messages: &[ChatMessage],
                _parameters: Option<GenerationParameters>,
            ) -> Result<ProviderReply, ProviderError> {
                self.generate_text("", None).await
            }

            fn model_id(&self) -> &str {
                "no-usage"
            }

            fn provider_name(&self) -> &str {
                "mock"
            }
        }

        let classification = TaskClassification::Chat;
        let router = router_with(classification, &["mock:nousage"], false)
            .with_provider("mock:nousage", Arc::new(NoUsageProvider));

        let result =
            router.route("abcdefgh", classification, RouteOptions::for_agent("chat")).await.unwrap();

        // ceil(8 / 4) = 2 prompt tokens with the default estimator.
        assert_eq!(result.prompt_tokens, 2);
        assert!(result.cost_usd > 0.0);
    }

    #[tokio::test]
    async fn test_metrics_observe_failures_and_success() {
        let classification = TaskClassification::Chat;
        let metrics = Arc::new(RecordingMetrics::default());
        let router = router_with(classification, &["mock:fail-a", "mock:b"], false)
            .with_metrics(Arc::clone(&metrics) as Arc<dyn MetricsSink>);

        router.route("hello", classification, RouteOptions::for_agent("chat")).await.unwrap();

        let calls = metrics.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].2);
        assert!(calls[1].2);
    }

    #[test]
    fn test_extract_json_variants() {
        assert!(extract_json(r#"{"a": 1}"#).is_some());
        assert!(extract_json("Here you go:\n```json\n[1, 2, 3]\n```").is_some());
        assert!(extract_json("no payload here").is_none());
    }
}
