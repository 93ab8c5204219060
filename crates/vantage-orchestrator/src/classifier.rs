//! Query classification.
//!
//! Scores each candidate agent by counting configured keyword matches in the
//! query (case-insensitive substring match, optionally weighted), breaking
//! ties by a fixed priority order and falling back to a default agent when
//! nothing matches. The scoring itself is a pure function over a table
//! snapshot; the table can be swapped at runtime without touching the
//! execution path.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// One keyword with its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSpec {
    /// The term matched as a case-insensitive substring.
    pub term: String,
    /// Score contributed when the term matches.
    pub weight: f64,
}

impl KeywordSpec {
    /// Creates a keyword with weight 1.0.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self { term: term.into().to_lowercase(), weight: 1.0 }
    }

    /// Creates a weighted keyword.
    #[must_use]
    pub fn weighted(term: impl Into<String>, weight: f64) -> Self {
        Self { term: term.into().to_lowercase(), weight }
    }

    /// Parses `"term"` or `"term:weight"` (e.g., `"battlecard:2.5"`).
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        if let Some((term, weight)) = spec.rsplit_once(':') {
            if let Ok(weight) = weight.parse::<f64>() {
                return Self::weighted(term, weight);
            }
        }
        Self::new(spec)
    }
}

/// Data-driven dispatch table: agent id -> keyword set, plus tie-break order
/// and the fallback agent.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable {
    /// Keywords per agent.
    pub keywords: HashMap<String, Vec<KeywordSpec>>,
    /// Fixed priority order for ties (earlier wins). Agents missing from the
    /// list rank after it, alphabetically.
    pub priority: Vec<String>,
    /// Agent selected when every score is zero.
    pub default_agent: String,
}

impl KeywordTable {
    /// Creates a table with the given keywords, priority, and default agent.
    #[must_use]
    pub fn new(
        keywords: HashMap<String, Vec<KeywordSpec>>,
        priority: Vec<String>,
        default_agent: String,
    ) -> Self {
        Self { keywords, priority, default_agent }
    }

    fn priority_rank(&self, agent: &str) -> (usize, String) {
        let rank = self
            .priority
            .iter()
            .position(|p| p == agent)
            .unwrap_or(self.priority.len());
        (rank, agent.to_string())
    }
}

/// The outcome of classifying one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// The selected agent.
    pub agent_id: String,
    /// The winning score (0.0 when the default agent was used).
    pub score: f64,
    /// Whether the selection fell back to the default agent.
    pub defaulted: bool,
}

/// Scores one agent's keyword set against a query.
///
/// Pure: the score is the sum of weights of keywords found in the query as
/// case-insensitive substrings.
#[must_use]
pub fn score_keywords(query: &str, keywords: &[KeywordSpec]) -> f64 {
    let query_lower = query.to_lowercase();
    keywords
        .iter()
        .filter(|spec| query_lower.contains(&spec.term))
        .map(|spec| spec.weight)
        .sum()
}

/// Classifier over a swappable table snapshot.
///
/// Within one snapshot classification is deterministic; reloading the table
/// is the only way results change between calls.
pub struct QueryClassifier {
    table: RwLock<Arc<KeywordTable>>,
}

impl QueryClassifier {
    /// Creates a classifier over the given table.
    #[must_use]
    pub fn new(table: KeywordTable) -> Self {
        Self { table: RwLock::new(Arc::new(table)) }
    }

    /// The current table snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<KeywordTable> {
        Arc::clone(&self.table.read().expect("Classifier lock poisoned"))
    }

    /// Replaces the table for subsequent classifications.
    pub fn reload(&self, table: KeywordTable) {
        let mut guard = self.table.write().expect("Classifier lock poisoned");
        *guard = Arc::new(table);
        debug!("Reloaded classifier keyword table");
    }

    /// Selects the best-matching agent for a query.
    #[must_use]
    pub fn classify(&self, query: &str) -> Classification {
        let table = self.snapshot();

        let mut scored: Vec<(&String, f64)> = table
            .keywords
            .iter()
            .map(|(agent, keywords)| (agent, score_keywords(query, keywords)))
            .collect();

        // Highest score first; ties resolved by the fixed priority order.
        scored.sort_by(|(a_agent, a_score), (b_agent, b_score)| {
            b_score
                .total_cmp(a_score)
                .then_with(|| table.priority_rank(a_agent).cmp(&table.priority_rank(b_agent)))
        });

        match scored.first() {
            Some((agent, score)) if *score > 0.0 => {
                debug!(agent = %agent, score, "Classified query");
                Classification { agent_id: (*agent).clone(), score: *score, defaulted: false }
            }
            _ => {
                debug!(default_agent = %table.default_agent, "No keyword matches, using default agent");
                Classification {
                    agent_id: table.default_agent.clone(),
                    score: 0.0,
                    defaulted: true,
                }
            }
        }
    }
}

impl std::fmt::Debug for QueryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClassifier")
            .field("agents", &self.snapshot().keywords.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> KeywordTable {
        let mut keywords = HashMap::new();
        keywords.insert(
            "dashboard".to_string(),
            vec![KeywordSpec::new("threat"), KeywordSpec::new("summary"), KeywordSpec::new("overview")],
        );
        keywords.insert(
            "discovery".to_string(),
            vec![KeywordSpec::new("find"), KeywordSpec::new("discover")],
        );
        KeywordTable::new(
            keywords,
            vec!["dashboard".to_string(), "discovery".to_string()],
            "chat".to_string(),
        )
    }

    #[test]
    fn test_threat_query_classifies_to_dashboard() {
        let classifier = QueryClassifier::new(table());
        let result = classifier.classify("What are the top threats?");
        assert_eq!(result.agent_id, "dashboard");
        assert!(!result.defaulted);
    }

    #[test]
    fn test_no_match_falls_back_to_default() {
        let classifier = QueryClassifier::new(table());
        let result = classifier.classify("Tell me something interesting");
        assert_eq!(result.agent_id, "chat");
        assert!(result.defaulted);
        assert!(result.score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = QueryClassifier::new(table());
        let first = classifier.classify("Find a summary of threats");
        for _ in 0..10 {
            assert_eq!(classifier.classify("Find a summary of threats"), first);
        }
    }

    #[test]
    fn test_tie_broken_by_priority() {
        let mut keywords = HashMap::new();
        keywords.insert("a".to_string(), vec![KeywordSpec::new("acme")]);
        keywords.insert("b".to_string(), vec![KeywordSpec::new("acme")]);
        let table =
            KeywordTable::new(keywords, vec!["b".to_string(), "a".to_string()], "chat".to_string());

        let classifier = QueryClassifier::new(table);
        assert_eq!(classifier.classify("acme news").agent_id, "b");
    }

    #[test]
    fn test_weighted_keyword_outranks_count() {
        let mut keywords = HashMap::new();
        keywords.insert(
            "battlecard".to_string(),
            vec![KeywordSpec::weighted("battlecard", 3.0)],
        );
        keywords.insert(
            "news".to_string(),
            vec![KeywordSpec::new("recent"), KeywordSpec::new("latest")],
        );
        let table = KeywordTable::new(keywords, vec![], "chat".to_string());

        let classifier = QueryClassifier::new(table);
        let result = classifier.classify("battlecard with recent and latest updates");
        assert_eq!(result.agent_id, "battlecard");
    }

    #[test]
    fn test_reload_changes_subsequent_results() {
        let classifier = QueryClassifier::new(table());
        assert_eq!(classifier.classify("threat report").agent_id, "dashboard");

        let mut keywords = HashMap::new();
        keywords.insert("research".to_string(), vec![KeywordSpec::new("threat")]);
        classifier.reload(KeywordTable::new(keywords, vec![], "chat".to_string()));

        assert_eq!(classifier.classify("threat report").agent_id, "research");
    }

    #[test]
    fn test_keyword_spec_parse() {
        assert_eq!(KeywordSpec::parse("find"), KeywordSpec::new("find"));
        assert_eq!(KeywordSpec::parse("battlecard:2.5"), KeywordSpec::weighted("battlecard", 2.5));
        // Unparseable weight stays part of the term.
        assert_eq!(KeywordSpec::parse("a:b"), KeywordSpec::new("a:b"));
    }
}
