//! Types for citation validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of source record an evidence snippet comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A tracked competitor record.
    Competitor,
    /// A product or feature record.
    Product,
    /// A news item.
    News,
    /// An uploaded or crawled document.
    Document,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Competitor => write!(f, "competitor"),
            Self::Product => write!(f, "product"),
            Self::News => write!(f, "news"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// A ranked text snippet returned by the retrieval capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    /// Stable identifier of the source record.
    pub id: String,
    /// What kind of record the snippet comes from.
    pub kind: SourceKind,
    /// The snippet text.
    pub content: String,
    /// Optional URL or internal reference.
    pub locator: Option<String>,
}

impl EvidenceSnippet {
    /// Creates a snippet without a locator.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: SourceKind, content: impl Into<String>) -> Self {
        Self { id: id.into(), kind, content: content.into(), locator: None }
    }

    /// Sets the locator.
    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}

/// A structured pointer from a generated claim to its supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Identifier of the supporting source record.
    pub source_id: String,
    /// Kind of the supporting source.
    pub kind: SourceKind,
    /// The supporting content, possibly truncated.
    pub excerpt: String,
    /// Match strength in [0, 1].
    pub confidence: f64,
    /// Optional URL or internal reference.
    pub locator: Option<String>,
}

/// What to do with claims that no evidence supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Remove unsupported claims from the output text.
    Strict,
    /// Keep unsupported claims in the text but flag them.
    Permissive,
}

impl ValidationMode {
    /// Parses a mode name.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "permissive" => Some(Self::Permissive),
            _ => None,
        }
    }
}

/// Configuration for the citation validator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationConfig {
    /// Minimum overlap score for a claim to count as supported.
    pub threshold: f64,
    /// How unsupported claims are handled.
    pub mode: ValidationMode,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { threshold: 0.6, mode: ValidationMode::Strict }
    }
}

/// A claim that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedClaim {
    /// The claim text as it appeared in the response.
    pub claim: String,
    /// The best overlap score any snippet achieved.
    pub best_score: f64,
}

/// The result of validating a response against an evidence set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// The cleaned response text (unchanged in permissive mode).
    pub text: String,
    /// One citation per supported claim, in claim order.
    pub citations: Vec<Citation>,
    /// Claims that no evidence supported (removed in strict mode, flagged in
    /// permissive mode).
    pub rejected: Vec<RejectedClaim>,
}
