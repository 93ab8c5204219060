//! Background task service.
//!
//! Wraps long-running orchestrator invocations in a pollable, cancellable
//! unit of work. Cancellation is cooperative: a pending task cancels
//! immediately and never executes; a running task cancels once the in-flight
//! provider call observes the signal at its next suspension point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ErrorEnvelope, OrchestrationError, TaskError};
use crate::{AgentContext, AgentResponse, Orchestrator};

/// Task execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished with a response.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Checks if the task can transition to the given status.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Pending, Self::Running | Self::Cancelled) => true,
            (Self::Running, Self::Completed | Self::Failed | Self::Cancelled) => true,
            (a, b) if a == b => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A tracked unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: String,
    /// Current status.
    pub status: TaskStatus,
    /// When the task was submitted.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
    /// The response, once completed.
    pub response: Option<AgentResponse>,
    /// The sanitized error, once failed.
    pub error: Option<ErrorEnvelope>,
}

impl Task {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self { id, status: TaskStatus::Pending, created_at: now, updated_at: now, response: None, error: None }
    }

    /// Applies a status transition, rejecting invalid ones.
    fn transition(&mut self, to: TaskStatus) -> bool {
        if !self.status.can_transition_to(to) {
            error!(
                task_id = %self.id,
                from = %self.status,
                to = %to,
                "Invalid task status transition"
            );
            return false;
        }
        debug!(task_id = %self.id, from = %self.status, to = %to, "Task status transition");
        self.status = to;
        self.updated_at = Utc::now();
        true
    }
}

struct TaskRecord {
    task: Task,
    cancel: CancellationToken,
}

/// Tracks and executes background orchestrator work.
///
/// Finished tasks are retained for a bounded window and then purged; callers
/// poll `status` rather than block.
pub struct BackgroundTaskService {
    orchestrator: Arc<Orchestrator>,
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
    retention: Duration,
}

impl BackgroundTaskService {
    /// Creates a service executing through the given orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, retention: Duration) -> Self {
        Self { orchestrator, tasks: Arc::new(RwLock::new(HashMap::new())), retention }
    }

    /// Submits a query for background execution and returns the task ID.
    pub async fn submit(&self, query: String, context: AgentContext) -> String {
        let id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();

        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(
                id.clone(),
                TaskRecord { task: Task::new(id.clone()), cancel: token.clone() },
            );
        }

        info!(task_id = %id, query_len = query.len(), "Submitted background task");

        let tasks = Arc::clone(&self.tasks);
        let orchestrator = Arc::clone(&self.orchestrator);
        let task_id = id.clone();
        tokio::spawn(async move {
            Self::run(tasks, orchestrator, task_id, query, context, token).await;
        });

        id
    }

    async fn run(
        tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
        orchestrator: Arc<Orchestrator>,
        id: String,
        query: String,
        context: AgentContext,
        token: CancellationToken,
    ) {
        // A task cancelled while still pending must never execute.
        {
            let mut guard = tasks.write().await;
            let Some(record) = guard.get_mut(&id) else { return };
            if record.task.status == TaskStatus::Cancelled {
                debug!(task_id = %id, "Task cancelled before start, skipping execution");
                return;
            }
            record.task.transition(TaskStatus::Running);
        }

        let result = tokio::select! {
            () = token.cancelled() => Err(OrchestrationError::Cancelled),
            result = orchestrator.handle_query(&query, &context) => result,
        };

        let mut guard = tasks.write().await;
        let Some(record) = guard.get_mut(&id) else { return };
        match result {
            Ok(response) => {
                record.task.response = Some(response);
                record.task.transition(TaskStatus::Completed);
            }
            Err(OrchestrationError::Cancelled) => {
                record.task.transition(TaskStatus::Cancelled);
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "Background task failed");
                record.task.error = Some(ErrorEnvelope::from_error(&e));
                record.task.transition(TaskStatus::Failed);
            }
        }
    }

    /// Looks up a task's current state.
    ///
    /// # Errors
    /// Returns `TaskError::NotFound` if the task does not exist or was purged.
    pub async fn status(&self, id: &str) -> Result<Task, TaskError> {
        self.purge_expired().await;

        let tasks = self.tasks.read().await;
        tasks
            .get(id)
            .map(|record| record.task.clone())
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    /// Best-effort cancellation.
    ///
    /// Pending tasks transition to cancelled immediately; running tasks are
    /// signalled and transition once the in-flight call observes the token.
    ///
    /// # Errors
    /// Returns `TaskError::NotFound` if the task does not exist.
    pub async fn cancel(&self, id: &str) -> Result<bool, TaskError> {
        let mut tasks = self.tasks.write().await;
        let record = tasks.get_mut(id).ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        match record.task.status {
            TaskStatus::Pending => {
                record.task.transition(TaskStatus::Cancelled);
                record.cancel.cancel();
                info!(task_id = %id, "Cancelled pending task");
                Ok(true)
            }
            TaskStatus::Running => {
                record.cancel.cancel();
                info!(task_id = %id, "Signalled running task for cancellation");
                Ok(true)
            }
            status => {
                debug!(task_id = %id, status = %status, "Cancel requested on terminal task");
                Ok(false)
            }
        }
    }

    /// Removes terminal tasks older than the retention window.
    ///
    /// Called lazily from `status`; hosts may also call it periodically.
    pub async fn purge_expired(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());

        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, record| {
            !(record.task.status.is_terminal() && record.task.updated_at < cutoff)
        });
        let removed = before - tasks.len();
        if removed > 0 {
            debug!(removed, "Purged expired background tasks");
        }
        removed
    }

    /// Number of tracked tasks (any status).
    pub async fn count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

impl fmt::Debug for BackgroundTaskService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTaskService")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{ChatAgent, testing};
    use crate::routing::OrchestratorConfig;

    async fn service_with(context_content: &str, retention: Duration) -> (BackgroundTaskService, AgentContext) {
        let orchestrator =
            Orchestrator::new(OrchestratorConfig::default().keyword_table());
        orchestrator.register(Arc::new(ChatAgent::new())).await;
        let context = testing::permissive_context(context_content);
        (BackgroundTaskService::new(Arc::new(orchestrator), retention), context)
    }

    #[tokio::test]
    async fn test_submit_completes_with_response() {
        let (service, context) = service_with("All good.", Duration::from_secs(60)).await;

        let id = service.submit("anything at all".to_string(), context).await;

        // Poll until terminal.
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if service.status(&id).await.unwrap().status.is_terminal() {
                break;
            }
        }

        let task = service.status(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let response = task.response.unwrap();
        assert_eq!(response.agent, "chat");
        assert!(task.error.is_none());
    }

    #[tokio::test]
    async fn test_cancel_pending_never_executes() {
        let (service, context) = service_with("Should never be produced", Duration::from_secs(60)).await;

        let id = service.submit("anything".to_string(), context.clone()).await;
        // Cancel before the spawned task has had a chance to run.
        assert!(service.cancel(&id).await.unwrap());

        tokio::time::sleep(Duration::from_millis(20)).await;

        let task = service.status(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.response.is_none());
        // No model call was ever made.
        assert!(context.router.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let (service, _context) = service_with("x", Duration::from_secs(60)).await;
        let err = service.cancel("no-such-task").await.unwrap_err();
        assert_eq!(err, TaskError::NotFound("no-such-task".to_string()));
    }

    #[tokio::test]
    async fn test_cancel_terminal_task_returns_false() {
        let (service, context) = service_with("Done.", Duration::from_secs(60)).await;
        let id = service.submit("anything".to_string(), context).await;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if service.status(&id).await.unwrap().status.is_terminal() {
                break;
            }
        }

        assert!(!service.cancel(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_after_retention() {
        let (service, context) = service_with("Done.", Duration::ZERO).await;
        let id = service.submit("anything".to_string(), context).await;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if service.count().await == 0 {
                break;
            }
            // status() purges lazily once the task is terminal.
            let _ = service.status(&id).await;
        }

        assert_eq!(service.count().await, 0);
        assert_eq!(service.status(&id).await.unwrap_err(), TaskError::NotFound(id));
    }

    #[test]
    fn test_status_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Cancelled));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
    }
}
