#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use concerto_core::*;
use std::sync::Arc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// A trivial worker used through the trait object
// ---------------------------------------------------------------------------

struct Shouter {
    name: String,
}

#[async_trait]
impl Worker for Shouter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, task: &Task) -> ConcertoResult<Response> {
        if task.as_str().contains("fail") {
            return Err(ConcertoError::external(&self.name, "refused"));
        }
        Ok(Response::new(&self.name, task.as_str().to_uppercase()))
    }
}

#[tokio::test]
async fn worker_trait_object_responds() {
    let worker: Arc<dyn Worker> = Arc::new(Shouter {
        name: "loud".into(),
    });
    let task = Task::new("hello").unwrap();

    let response = worker.respond(&task).await.unwrap();
    assert_eq!(response.worker_name, "loud");
    assert_eq!(response.content, "HELLO");
    assert_eq!(worker.description(), "");
}

#[tokio::test]
async fn worker_failure_names_the_worker() {
    let worker = Shouter {
        name: "loud".into(),
    };
    let err = worker
        .respond(&Task::new("please fail").unwrap())
        .await
        .unwrap_err();

    match err {
        ConcertoError::ExternalCall { worker, cause } => {
            assert_eq!(worker, "loud");
            assert_eq!(cause, "refused");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// InvocationResult serialization keeps responses and failures
// ---------------------------------------------------------------------------

#[test]
fn invocation_result_serialization_roundtrip() {
    let mut result = InvocationResult::new(Uuid::new_v4());
    result.responses.push(Response::new("A", "first"));
    result.responses.push(Response::new("A", "duplicate name is allowed"));
    result.failures.push(WorkerFailure::new(
        "B",
        ConcertoError::external("B", "HTTP 503"),
    ));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["responses"].as_array().unwrap().len(), 2);
    assert!(json["failures"][0]["error"]
        .as_str()
        .unwrap()
        .contains("HTTP 503"));

    let parsed: InvocationResult = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.invocation_id, result.invocation_id);
    assert_eq!(parsed.len(), 2);
    assert!(parsed.failed("B"));
}

#[test]
fn task_conversions() {
    let task: Task = "What is temperature?".try_into().unwrap();
    assert_eq!(task.to_string(), "What is temperature?");
    assert!(Task::try_from(String::new()).is_err());
}
