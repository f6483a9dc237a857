use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an [`InProcessRuntime`](crate::InProcessRuntime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    Created,
    Started,
    /// `stop_when_idle` was called and is waiting for pending work.
    Stopping,
    Stopped,
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeState::Created => write!(f, "created"),
            RuntimeState::Started => write!(f, "started"),
            RuntimeState::Stopping => write!(f, "stopping"),
            RuntimeState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Runtime tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound on workers executing at the same time. `None` is unbounded.
    #[serde(default)]
    pub max_concurrent_workers: Option<usize>,
}

/// How an orchestration treats a worker whose call failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep collecting the other workers.
    #[default]
    IsolateAndContinue,
    /// Abort the remaining workers and return the first failure.
    FailFast,
}

/// A worker run that has been dispatched and has not finished yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: Uuid,
    pub worker_name: String,
    /// Invocation the run belongs to, if it was dispatched through one.
    pub invocation_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
}

/// Metrics tracked per worker name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub runs: u32,
    pub failures: u32,
    /// Runs aborted by a timeout, cancellation, or dropped handle.
    pub cancellations: u32,
    pub duration_ms: u64,
}

/// Snapshot of one worker's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerState {
    pub worker_name: String,
    pub status: WorkerStatus,
    pub in_flight: u32,
    pub metrics: WorkerMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Working,
    /// The most recent run failed.
    Error,
}
