//! Background task lifecycle through the service facade.

use std::sync::Arc;
use std::time::Duration;

use vantage_orchestrator::api::QueryRequest;
use vantage_orchestrator::routing::OrchestratorConfig;
use vantage_orchestrator::tasks::TaskStatus;
use vantage_orchestrator::{AgentService, StaticRetriever};

fn request(query: &str) -> QueryRequest {
    QueryRequest { query: query.to_string(), user_id: "analyst-1".to_string(), session_id: None }
}

async fn mock_service(chain: &[&str]) -> AgentService {
    let specs =
        chain.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(", ");
    let config = OrchestratorConfig::from_toml_str(&format!(
        r#"
[routing]
last_resort = "{last}"
default = [{specs}]

[citations]
mode = "permissive"

[tasks]
retention_secs = 60
"#,
        last = chain.last().unwrap(),
    ))
    .unwrap();
    AgentService::from_config(&config, Arc::new(StaticRetriever::default())).await.unwrap()
}

async fn wait_terminal(service: &AgentService, task_id: &str) -> TaskStatus {
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let task = service.task(task_id).await.unwrap();
        if task.status.is_terminal() {
            return task.status;
        }
    }
    panic!("task never reached a terminal status");
}

#[tokio::test]
async fn submitted_task_completes_with_response() {
    let service = mock_service(&["mock:primary"]).await;
    let submitted = service.submit_task(request("hello")).await;

    assert_eq!(wait_terminal(&service, &submitted.task_id).await, TaskStatus::Completed);

    let task = service.task(&submitted.task_id).await.unwrap();
    let response = task.response.unwrap();
    assert_eq!(response.agent, "chat");
    assert!(task.error.is_none());
}

#[tokio::test]
async fn cancelling_a_pending_task_prevents_execution() {
    let service = mock_service(&["mock:primary"]).await;
    let submitted = service.submit_task(request("hello")).await;

    // Cancel before the scheduler has started the task.
    assert!(service.cancel_task(&submitted.task_id).await.unwrap());

    tokio::time::sleep(Duration::from_millis(30)).await;

    let task = service.task(&submitted.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.response.is_none());

    // The provider chain was never invoked, so nothing was billed.
    assert_eq!(service.cost(None).request_count, 0);
}

#[tokio::test]
async fn failed_tasks_carry_a_sanitized_error() {
    let service = mock_service(&["mock:fail-a", "mock:fail-b"]).await;
    let submitted = service.submit_task(request("hello")).await;

    assert_eq!(wait_terminal(&service, &submitted.task_id).await, TaskStatus::Failed);

    let task = service.task(&submitted.task_id).await.unwrap();
    let error = task.error.unwrap();
    assert_eq!(error.kind, "provider_exhausted");
    assert!(!error.message.contains("mock"));
}

#[tokio::test]
async fn unknown_task_id_is_not_found() {
    let service = mock_service(&["mock:primary"]).await;
    let err = service.task("does-not-exist").await.unwrap_err();
    assert_eq!(err.kind, "task_not_found");
}
