//! Shared prompt assembly for the specialist agents.

use crate::citations::EvidenceSnippet;
use std::fmt::Write;

/// Fixed anti-hallucination instruction prepended to every system prompt.
pub const GROUNDING_PREAMBLE: &str = "Base every statement strictly on the provided evidence. \
If the evidence does not support a statement, say that the information is unavailable instead of \
guessing. Never invent numbers, dates, quotes, product names, or sources.";

/// Builds a system prompt: the grounding preamble followed by the agent's
/// specialty instructions.
#[must_use]
pub fn system_prompt(specialty: &str) -> String {
    format!("{GROUNDING_PREAMBLE}\n\n{specialty}")
}

/// Renders evidence snippets as a numbered block for inclusion in a prompt.
#[must_use]
pub fn render_evidence(evidence: &[EvidenceSnippet]) -> String {
    if evidence.is_empty() {
        return "No evidence is available.".to_string();
    }

    let mut block = String::from("Evidence:\n");
    for (index, snippet) in evidence.iter().enumerate() {
        let _ = writeln!(
            block,
            "[{}] ({} {}) {}",
            index + 1,
            snippet.kind,
            snippet.id,
            snippet.content
        );
    }
    block
}

/// Builds the user prompt: evidence block, then the question.
#[must_use]
pub fn user_prompt(query: &str, evidence: &[EvidenceSnippet]) -> String {
    format!("{}\nQuestion: {}", render_evidence(evidence), query)
}
