//! Per-model pricing and usage estimation.

use std::collections::HashMap;

use vantage_abstraction::TokenUsage;

/// Per-model $/1M-token rates with pattern-matched defaults.
///
/// When a provider does not report native usage accounting, token counts are
/// estimated from text length through a configurable characters-per-token
/// divisor; the estimate then runs through the same rate table as reported
/// usage.
#[derive(Debug, Clone)]
pub struct PricingTable {
    /// Exact model-id rates: model -> (input per 1M, output per 1M).
    rates: HashMap<String, (f64, f64)>,
    /// Divisor for estimating tokens from character counts.
    chars_per_token: u32,
}

impl PricingTable {
    /// Creates a pricing table with explicit rates.
    #[must_use]
    pub fn new(rates: HashMap<String, (f64, f64)>, chars_per_token: u32) -> Self {
        Self { rates, chars_per_token: chars_per_token.max(1) }
    }

    /// Rates for a model: the exact entry when configured, otherwise a
    /// pattern-matched default.
    #[must_use]
    pub fn rate_for(&self, model_id: &str) -> (f64, f64) {
        if let Some(rate) = self.rates.get(model_id) {
            return *rate;
        }
        Self::default_rate(model_id)
    }

    /// Default rate lookup based on model ID patterns (per 1M tokens).
    fn default_rate(model_id: &str) -> (f64, f64) {
        let lower = model_id.to_lowercase();

        // High-capability tiers
        if lower.contains("opus") || lower.contains("gpt-4") && !lower.contains("mini") {
            return (15.0, 75.0);
        }
        if lower.contains("sonnet") || (lower.contains("pro") && !lower.contains("mini")) {
            return (3.0, 15.0);
        }

        // Cost-effective tiers
        if lower.contains("haiku")
            || lower.contains("mini")
            || lower.contains("flash")
            || lower.contains("gpt-3.5")
        {
            return (0.25, 1.25);
        }

        (1.0, 2.0)
    }

    /// Cost in USD for the given usage on the given model.
    #[must_use]
    pub fn cost(&self, model_id: &str, usage: TokenUsage) -> f64 {
        let (input_rate, output_rate) = self.rate_for(model_id);
        (f64::from(usage.prompt_tokens) / 1_000_000.0) * input_rate
            + (f64::from(usage.completion_tokens) / 1_000_000.0) * output_rate
    }

    /// Estimates usage from prompt and completion text lengths.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn estimate_usage(&self, prompt: &str, completion: &str) -> TokenUsage {
        let estimate = |text: &str| -> u32 {
            (text.chars().count() as u32).div_ceil(self.chars_per_token)
        };
        TokenUsage::new(estimate(prompt), estimate(completion))
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new(HashMap::new(), 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_rate_wins() {
        let mut rates = HashMap::new();
        rates.insert("custom-model".to_string(), (9.0, 18.0));
        let table = PricingTable::new(rates, 4);
        assert_eq!(table.rate_for("custom-model"), (9.0, 18.0));
    }

    #[test]
    fn test_pattern_defaults() {
        let table = PricingTable::default();
        assert_eq!(table.rate_for("claude-sonnet-4-5"), (3.0, 15.0));
        assert_eq!(table.rate_for("claude-haiku-4-5"), (0.25, 1.25));
        assert_eq!(table.rate_for("gpt-4o-mini"), (0.25, 1.25));
        assert_eq!(table.rate_for("gemini-2.0-flash"), (0.25, 1.25));
        assert_eq!(table.rate_for("unknown-model"), (1.0, 2.0));
    }

    #[test]
    fn test_cost_computation() {
        let table = PricingTable::default();
        // 1M input + 1M output on a sonnet-class model.
        let usage = TokenUsage::new(1_000_000, 1_000_000);
        let cost = table.cost("claude-sonnet-4-5", usage);
        assert!((cost - 18.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_estimation_rounds_up() {
        let table = PricingTable::new(HashMap::new(), 4);
        let usage = table.estimate_usage("abcde", "xy");
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, 1);
    }

    #[test]
    fn test_zero_divisor_clamped() {
        let table = PricingTable::new(HashMap::new(), 0);
        let usage = table.estimate_usage("abcd", "");
        assert_eq!(usage.prompt_tokens, 4);
    }
}
