//! Claim splitting and overlap scoring.

use std::collections::HashSet;

use tracing::debug;

use super::types::{
    Citation, EvidenceSnippet, RejectedClaim, ValidationConfig, ValidationMode, ValidationOutcome,
};

/// Words too common to carry evidential weight.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "were",
    "will", "with",
];

/// Maximum excerpt length carried on a citation.
const EXCERPT_LEN: usize = 200;

/// Splits response text into atomic claims at sentence granularity.
///
/// Sentences end at `.`, `!`, or `?` followed by whitespace, or at line
/// breaks. Empty fragments and markdown bullets reduce to their text.
#[must_use]
pub fn split_claims(text: &str) -> Vec<String> {
    let mut claims = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\n' {
            push_claim(&mut claims, &mut current);
            continue;
        }

        current.push(ch);

        if matches!(ch, '.' | '!' | '?') {
            // Sentence boundary only when followed by whitespace or end of text.
            match chars.peek() {
                Some(next) if next.is_whitespace() => push_claim(&mut claims, &mut current),
                None => push_claim(&mut claims, &mut current),
                _ => {}
            }
        }
    }
    push_claim(&mut claims, &mut current);

    claims
}

fn push_claim(claims: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim().trim_start_matches(['-', '*', '•']).trim();
    if !trimmed.is_empty() {
        claims.push(trimmed.to_string());
    }
    current.clear();
}

/// Lowercased alphanumeric tokens with stopwords removed.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Fraction of the claim's tokens that appear in the evidence.
///
/// Overlap is measured relative to the claim, so a short claim fully contained
/// in a long snippet still scores 1.0.
fn overlap_score(claim_tokens: &HashSet<String>, evidence_tokens: &HashSet<String>) -> f64 {
    if claim_tokens.is_empty() {
        return 0.0;
    }
    let shared = claim_tokens.intersection(evidence_tokens).count();
    shared as f64 / claim_tokens.len() as f64
}

/// Validates response text against an evidence set.
///
/// Each claim is matched against every snippet; the best-scoring snippet above
/// the configured threshold yields a `Citation` with confidence equal to the
/// match strength. Unsupported claims are removed (`Strict`) or kept and
/// flagged (`Permissive`).
///
/// Deterministic for a given evidence set and configuration.
#[must_use]
pub fn validate(
    text: &str,
    evidence: &[EvidenceSnippet],
    config: &ValidationConfig,
) -> ValidationOutcome {
    let claims = split_claims(text);
    let evidence_tokens: Vec<HashSet<String>> =
        evidence.iter().map(|snippet| tokenize(&snippet.content)).collect();

    let mut kept = Vec::new();
    let mut citations = Vec::new();
    let mut rejected = Vec::new();

    for claim in claims {
        let claim_tokens = tokenize(&claim);

        let best = evidence_tokens
            .iter()
            .enumerate()
            .map(|(idx, tokens)| (idx, overlap_score(&claim_tokens, tokens)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        match best {
            Some((idx, score)) if score >= config.threshold => {
                let snippet = &evidence[idx];
                citations.push(Citation {
                    source_id: snippet.id.clone(),
                    kind: snippet.kind,
                    excerpt: truncate_excerpt(&snippet.content),
                    confidence: score.min(1.0),
                    locator: snippet.locator.clone(),
                });
                kept.push(claim);
            }
            best => {
                let best_score = best.map_or(0.0, |(_, score)| score);
                debug!(
                    claim = %claim,
                    best_score,
                    threshold = config.threshold,
                    mode = ?config.mode,
                    "Claim lacks supporting evidence"
                );
                rejected.push(RejectedClaim { claim: claim.clone(), best_score });
                if config.mode == ValidationMode::Permissive {
                    kept.push(claim);
                }
            }
        }
    }

    ValidationOutcome { text: kept.join(" "), citations, rejected }
}

fn truncate_excerpt(content: &str) -> String {
    if content.len() <= EXCERPT_LEN {
        return content.to_string();
    }
    let mut cut = EXCERPT_LEN;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &content[..cut])
}
