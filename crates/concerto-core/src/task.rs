use crate::error::{ConcertoError, ConcertoResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// An immutable, non-empty unit of work sent identically to every worker.
///
/// Cloning is cheap: the payload is shared, never copied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    content: Arc<str>,
}

impl Task {
    /// Create a task, rejecting empty or whitespace-only payloads.
    pub fn new(content: impl Into<String>) -> ConcertoResult<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ConcertoError::InvalidTask(
                "task must not be empty".to_string(),
            ));
        }
        Ok(Self {
            content: Arc::from(content),
        })
    }

    /// The task payload.
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

impl AsRef<str> for Task {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl TryFrom<&str> for Task {
    type Error = ConcertoError;

    fn try_from(value: &str) -> ConcertoResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for Task {
    type Error = ConcertoError;

    fn try_from(value: String) -> ConcertoResult<Self> {
        Self::new(value)
    }
}

/// One worker's answer to a [`Task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Name of the worker that produced this response.
    pub worker_name: String,
    /// The response body.
    pub content: String,
    /// When the worker finished.
    pub completed_at: DateTime<Utc>,
}

impl Response {
    pub fn new(worker_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
            content: content.into(),
            completed_at: Utc::now(),
        }
    }
}

/// A worker that did not produce a response within an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub worker_name: String,
    /// Rendered error.
    pub error: String,
}

impl WorkerFailure {
    pub fn new(worker_name: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            worker_name: worker_name.into(),
            error: error.to_string(),
        }
    }
}

/// The aggregated outcome of one orchestration invocation.
///
/// Entries appear in completion order, which is not the submission order.
/// Consumers must not rely on list position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Identifier of the invocation that produced this result.
    pub invocation_id: Uuid,
    /// Successful responses, one per worker that completed.
    pub responses: Vec<Response>,
    /// Workers whose call failed and was isolated.
    #[serde(default)]
    pub failures: Vec<WorkerFailure>,
}

impl InvocationResult {
    pub fn new(invocation_id: Uuid) -> Self {
        Self {
            invocation_id,
            responses: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Number of successful responses.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// First response from a worker with the given name.
    pub fn get(&self, worker_name: &str) -> Option<&Response> {
        self.responses.iter().find(|r| r.worker_name == worker_name)
    }

    /// Whether a failure was recorded for the given worker name.
    pub fn failed(&self, worker_name: &str) -> bool {
        self.failures.iter().any(|f| f.worker_name == worker_name)
    }

    /// Names of responding workers, in completion order.
    pub fn worker_names(&self) -> Vec<&str> {
        self.responses
            .iter()
            .map(|r| r.worker_name.as_str())
            .collect()
    }
}
