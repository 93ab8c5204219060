//! Citation validation.
//!
//! Cross-checks generated text against retrieved evidence and either strips or
//! flags claims that no evidence supports. Pure text processing: no I/O, no
//! shared state, deterministic for a given evidence set and configuration.

mod types;
mod validator;

pub use types::{
    Citation, EvidenceSnippet, RejectedClaim, SourceKind, ValidationConfig, ValidationMode,
    ValidationOutcome,
};
pub use validator::{split_claims, validate};
