//! Retrieval capability consumed from the surrounding system.
//!
//! The corpus-to-snippets machinery lives outside this subsystem; agents only
//! see the `Retriever` trait. `StaticRetriever` is an in-memory implementation
//! for tests and demos.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

use crate::citations::{EvidenceSnippet, SourceKind};
use crate::error::OrchestrationError;

/// Filters applied to a retrieval request.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    /// Restrict results to these source kinds (empty = all).
    pub kinds: Vec<SourceKind>,
    /// Restrict results to snippets about one domain entity.
    pub entity_id: Option<String>,
    /// Maximum number of snippets to return.
    pub limit: Option<usize>,
}

impl RetrievalFilters {
    /// Filter to a single source kind.
    #[must_use]
    pub fn for_kind(kind: SourceKind) -> Self {
        Self { kinds: vec![kind], ..Default::default() }
    }

    /// Caps the number of returned snippets.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The externally supplied retrieval capability.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns ranked evidence snippets for a query.
    ///
    /// # Errors
    /// Returns an `OrchestrationError` if the underlying store fails.
    async fn retrieve(
        &self,
        query: &str,
        filters: &RetrievalFilters,
    ) -> Result<Vec<EvidenceSnippet>, OrchestrationError>;
}

/// In-memory retriever over a fixed snippet set.
///
/// Ranks by word overlap with the query, which is enough for tests and the
/// demo CLI.
#[derive(Debug, Default)]
pub struct StaticRetriever {
    snippets: Vec<EvidenceSnippet>,
}

impl StaticRetriever {
    /// Creates a retriever over the given snippets.
    #[must_use]
    pub fn new(snippets: Vec<EvidenceSnippet>) -> Self {
        Self { snippets }
    }

    fn query_overlap(query_words: &HashSet<String>, snippet: &EvidenceSnippet) -> usize {
        snippet
            .content
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .filter(|w| query_words.contains(&w.to_lowercase()))
            .count()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(
        &self,
        query: &str,
        filters: &RetrievalFilters,
    ) -> Result<Vec<EvidenceSnippet>, OrchestrationError> {
        let query_words: HashSet<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut ranked: Vec<(usize, &EvidenceSnippet)> = self
            .snippets
            .iter()
            .filter(|s| filters.kinds.is_empty() || filters.kinds.contains(&s.kind))
            .filter(|s| {
                filters.entity_id.as_ref().is_none_or(|entity| s.id.starts_with(entity.as_str()))
            })
            .map(|s| (Self::query_overlap(&query_words, s), s))
            .collect();

        // Stable ordering: overlap descending, then id for determinism.
        ranked.sort_by(|(a_score, a), (b_score, b)| {
            b_score.cmp(a_score).then_with(|| a.id.cmp(&b.id))
        });

        let limit = filters.limit.unwrap_or(usize::MAX);
        let results: Vec<EvidenceSnippet> =
            ranked.into_iter().take(limit).map(|(_, s)| s.clone()).collect();

        debug!(query_len = query.len(), results = results.len(), "Static retrieval");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> StaticRetriever {
        StaticRetriever::new(vec![
            EvidenceSnippet::new("news-1", SourceKind::News, "Acme raised prices in June"),
            EvidenceSnippet::new("product-1", SourceKind::Product, "Acme Pro supports SSO"),
            EvidenceSnippet::new("competitor-1", SourceKind::Competitor, "Globex entered the market"),
        ])
    }

    #[tokio::test]
    async fn test_kind_filter() {
        let retriever = corpus();
        let filters = RetrievalFilters::for_kind(SourceKind::News);
        let results = retriever.retrieve("Acme prices", &filters).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "news-1");
    }

    #[tokio::test]
    async fn test_ranking_prefers_overlapping_snippets() {
        let retriever = corpus();
        let results =
            retriever.retrieve("Did Acme raise prices?", &RetrievalFilters::default()).await.unwrap();
        assert_eq!(results[0].id, "news-1");
    }

    #[tokio::test]
    async fn test_limit() {
        let retriever = corpus();
        let filters = RetrievalFilters::default().with_limit(2);
        let results = retriever.retrieve("Acme", &filters).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
