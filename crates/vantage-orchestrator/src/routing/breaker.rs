//! Circuit breaker for provider failure detection.
//!
//! Tracks a sliding-window failure rate per backend. Providers whose circuit
//! is open are skipped during fallback iteration (except as last resort) and
//! reported as unavailable through the status API.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Circuit breaker state for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Skipping the provider until the cooldown expires.
    Open(SystemTime),
    /// Testing recovery with one request.
    HalfOpen,
}

impl CircuitState {
    /// Whether calls to this provider should currently be skipped.
    fn should_skip(self, cooldown: Duration) -> bool {
        match self {
            Self::Closed | Self::HalfOpen => false,
            Self::Open(opened_at) => {
                opened_at.elapsed().map_or(false, |elapsed| elapsed < cooldown)
            }
        }
    }

    fn transition_if_cooldown_expired(self, cooldown: Duration) -> Self {
        match self {
            Self::Open(opened_at) => match opened_at.elapsed() {
                Ok(elapsed) if elapsed >= cooldown => Self::HalfOpen,
                Ok(_) => self,
                // SystemTime went backwards, probe recovery
                Err(_) => Self::HalfOpen,
            },
            _ => self,
        }
    }

    /// Label used in availability reporting.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open(_) => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Sliding-window health for a single provider.
#[derive(Debug)]
struct ProviderHealth {
    successes: VecDeque<SystemTime>,
    failures: VecDeque<SystemTime>,
    window: Duration,
}

impl ProviderHealth {
    fn new(window: Duration) -> Self {
        Self { successes: VecDeque::new(), failures: VecDeque::new(), window }
    }

    fn record(&mut self, success: bool) {
        let now = SystemTime::now();
        if success {
            self.successes.push_back(now);
        } else {
            self.failures.push_back(now);
        }
        Self::drop_stale(&mut self.successes, now, self.window);
        Self::drop_stale(&mut self.failures, now, self.window);
    }

    fn drop_stale(entries: &mut VecDeque<SystemTime>, now: SystemTime, window: Duration) {
        while let Some(&oldest) = entries.front() {
            match now.duration_since(oldest) {
                Ok(elapsed) if elapsed > window => {
                    entries.pop_front();
                }
                Ok(_) => break,
                Err(_) => {
                    entries.pop_front();
                }
            }
        }
    }

    fn samples(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    fn failure_rate(&self) -> f64 {
        let total = self.samples();
        if total == 0 {
            return 0.0;
        }
        self.failures.len() as f64 / total as f64
    }
}

/// Availability snapshot for one provider, consumed by the status API.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    /// The provider spec this snapshot covers.
    pub provider: String,
    /// Current circuit state.
    pub state: CircuitState,
    /// Failure rate inside the current window.
    pub failure_rate: f64,
}

/// Per-provider circuit breaker.
pub struct ProviderBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    health: RwLock<HashMap<String, ProviderHealth>>,
    /// Failure rate above which the circuit opens.
    failure_threshold: f64,
    /// Window for failure-rate calculation.
    window: Duration,
    /// Cooldown before an open circuit probes recovery.
    cooldown: Duration,
    /// Minimum samples in the window before the circuit may open.
    min_samples: usize,
}

impl ProviderBreaker {
    /// Creates a breaker with default settings (50% threshold, 5-minute
    /// window, 60-second cooldown, 8-sample minimum).
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(0.5, Duration::from_secs(300), Duration::from_secs(60))
    }

    /// Creates a breaker with custom settings.
    #[must_use]
    pub fn with_settings(failure_threshold: f64, window: Duration, cooldown: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
            failure_threshold,
            window,
            cooldown,
            min_samples: 8,
        }
    }

    /// Records the outcome of one attempt against a provider.
    pub fn record(&self, provider: &str, success: bool) {
        {
            let mut health = self.health.write().expect("Breaker health lock poisoned");
            health
                .entry(provider.to_string())
                .or_insert_with(|| ProviderHealth::new(self.window))
                .record(success);
        }

        let mut recovered = false;
        {
            let mut states = self.states.write().expect("Breaker state lock poisoned");
            let state = states.entry(provider.to_string()).or_insert(CircuitState::Closed);
            match (*state, success) {
                (CircuitState::HalfOpen, true) => {
                    *state = CircuitState::Closed;
                    debug!(provider, "Circuit breaker: HalfOpen -> Closed (recovery successful)");
                    recovered = true;
                }
                (CircuitState::HalfOpen, false) => {
                    *state = CircuitState::Open(SystemTime::now());
                    warn!(provider, "Circuit breaker: HalfOpen -> Open (recovery failed)");
                }
                _ => {}
            }
        }

        if recovered {
            // Forget the failures from the open period so the circuit doesn't
            // immediately reopen on history.
            let mut health = self.health.write().expect("Breaker health lock poisoned");
            health.insert(provider.to_string(), ProviderHealth::new(self.window));
            return;
        }

        self.maybe_open(provider);
    }

    fn maybe_open(&self, provider: &str) {
        let (failure_rate, samples) = {
            let health = self.health.read().expect("Breaker health lock poisoned");
            health
                .get(provider)
                .map_or((0.0, 0), |h| (h.failure_rate(), h.samples()))
        };

        if samples < self.min_samples || failure_rate <= self.failure_threshold {
            return;
        }

        let mut states = self.states.write().expect("Breaker state lock poisoned");
        let state = states.entry(provider.to_string()).or_insert(CircuitState::Closed);
        if matches!(*state, CircuitState::Closed) {
            *state = CircuitState::Open(SystemTime::now());
            warn!(
                provider,
                failure_rate,
                threshold = self.failure_threshold,
                samples,
                "Circuit breaker: Closed -> Open (failure rate exceeded threshold)"
            );
        }
    }

    /// Whether the provider should be skipped right now.
    ///
    /// Transitions Open -> HalfOpen when the cooldown has expired, so a
    /// skipped provider eventually gets one probe request.
    pub fn should_skip(&self, provider: &str) -> bool {
        let mut states = self.states.write().expect("Breaker state lock poisoned");
        let state = states.entry(provider.to_string()).or_insert(CircuitState::Closed);
        *state = state.transition_if_cooldown_expired(self.cooldown);
        state.should_skip(self.cooldown)
    }

    /// Current circuit state for a provider.
    #[must_use]
    pub fn state(&self, provider: &str) -> CircuitState {
        let states = self.states.read().expect("Breaker state lock poisoned");
        states.get(provider).copied().unwrap_or(CircuitState::Closed)
    }

    /// Failure rate in the current window.
    #[must_use]
    pub fn failure_rate(&self, provider: &str) -> f64 {
        let health = self.health.read().expect("Breaker health lock poisoned");
        health.get(provider).map_or(0.0, ProviderHealth::failure_rate)
    }

    /// Availability snapshot for the given providers.
    ///
    /// Providers the breaker has never seen report as closed with a zero
    /// failure rate.
    #[must_use]
    pub fn snapshot(&self, providers: &[String]) -> Vec<BreakerSnapshot> {
        providers
            .iter()
            .map(|provider| BreakerSnapshot {
                provider: provider.clone(),
                state: self.state(provider),
                failure_rate: self.failure_rate(provider),
            })
            .collect()
    }
}

impl Default for ProviderBreaker {
    fn default() -> Self {
        Self::new()
    }
}
