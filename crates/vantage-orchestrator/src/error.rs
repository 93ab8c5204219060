//! Error types for orchestration.
//!
//! Internal errors carry full causes for server-side logging; the API boundary
//! only ever surfaces an `ErrorEnvelope` with a stable kind code and a generic
//! message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::RoutingError;
use vantage_abstraction::ProviderError;

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Errors from the background task service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// No task with the given ID exists (or it has been purged).
    #[error("Task not found: {0}")]
    NotFound(String),

    /// The task already reached a terminal status.
    #[error("Task {id} is already {status}")]
    AlreadyTerminal {
        /// Task identifier.
        id: String,
        /// The terminal status the task is in.
        status: String,
    },
}

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The requested agent is not registered.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Routing failed (including provider exhaustion).
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A provider client failed outside of routing.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The retrieval capability failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// A background task operation failed.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Execution was cancelled cooperatively.
    #[error("Orchestration cancelled")]
    Cancelled,

    /// Other error.
    #[error("Orchestration error: {0}")]
    Other(String),
}

/// Stable error kind codes surfaced at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Every candidate provider failed.
    ProviderExhausted,
    /// The named agent does not exist.
    AgentNotFound,
    /// The named task does not exist.
    TaskNotFound,
    /// The work was cancelled.
    Cancelled,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// The wire representation of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProviderExhausted => "provider_exhausted",
            Self::AgentNotFound => "agent_not_found",
            Self::TaskNotFound => "task_not_found",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

/// The sanitized error shape returned to callers.
///
/// Never contains provider error text or any other internal detail; the full
/// cause chain is logged server-side before this envelope is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Stable kind code (see `ErrorKind`).
    pub kind: String,
    /// Short, generic, human-readable message.
    pub message: String,
}

impl ErrorEnvelope {
    /// Builds an envelope from a kind with its canonical message.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        let message = match kind {
            ErrorKind::ProviderExhausted => {
                "The AI service is temporarily unavailable. Please try again shortly."
            }
            ErrorKind::AgentNotFound => "No agent with that name is available.",
            ErrorKind::TaskNotFound => "No task with that ID was found.",
            ErrorKind::Cancelled => "The request was cancelled.",
            ErrorKind::Internal => "An internal error occurred while processing the request.",
        };
        Self { kind: kind.as_str().to_string(), message: message.to_string() }
    }

    /// Classifies an internal error into its sanitized envelope.
    #[must_use]
    pub fn from_error(error: &OrchestrationError) -> Self {
        let kind = match error {
            OrchestrationError::Routing(RoutingError::ProviderExhausted { .. }) => {
                ErrorKind::ProviderExhausted
            }
            OrchestrationError::AgentNotFound(_) => ErrorKind::AgentNotFound,
            OrchestrationError::Task(TaskError::NotFound(_)) => ErrorKind::TaskNotFound,
            OrchestrationError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Internal,
        };
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{FailureRecord, TaskClassification};

    #[test]
    fn test_envelope_hides_internal_detail() {
        let error = OrchestrationError::Routing(RoutingError::ProviderExhausted {
            classification: TaskClassification::Chat,
            failures: vec![FailureRecord::new(
                "anthropic:claude-haiku-4-5".to_string(),
                "secret internal cause".to_string(),
            )],
        });

        let envelope = ErrorEnvelope::from_error(&error);
        assert_eq!(envelope.kind, "provider_exhausted");
        assert!(!envelope.message.contains("secret"));
        assert!(!envelope.message.contains("claude"));
    }

    #[test]
    fn test_task_not_found_kind() {
        let error = OrchestrationError::Task(TaskError::NotFound("abc".to_string()));
        assert_eq!(ErrorEnvelope::from_error(&error).kind, "task_not_found");
    }

    #[test]
    fn test_unknown_errors_are_internal() {
        let error = OrchestrationError::Other("weird".to_string());
        let envelope = ErrorEnvelope::from_error(&error);
        assert_eq!(envelope.kind, "internal");
        assert!(!envelope.message.contains("weird"));
    }
}
