use crate::task::InvocationResult;
use std::time::Duration;
use thiserror::Error;

/// A convenience `Result` alias using [`ConcertoError`].
pub type ConcertoResult<T> = Result<T, ConcertoError>;

/// Top-level error type for the Concerto framework.
///
/// Orchestration errors (`EmptyMembers`, `OrchestrationTimeout`) and runtime
/// lifecycle errors (`AlreadyStarted`, `RuntimeStopped`, `RuntimeNotStarted`)
/// are raised to the caller of the offending call. `ExternalCall` is raised by
/// a single worker and is isolated per worker by the orchestrator unless the
/// fail-fast policy is selected.
#[derive(Error, Debug)]
pub enum ConcertoError {
    /// An orchestration was invoked with zero members.
    #[error("Orchestration has no members")]
    EmptyMembers,

    /// A task payload was empty or otherwise unusable.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// A worker's underlying call failed irrecoverably.
    #[error("External call failed for worker '{worker}': {cause}")]
    ExternalCall {
        /// Name of the worker whose call failed.
        worker: String,
        /// Underlying cause, rendered as text.
        cause: String,
    },

    /// The barrier timeout elapsed before every worker completed.
    #[error(
        "Orchestration timed out after {timeout:?} ({} responses, {} failures collected)",
        .partial.responses.len(),
        .partial.failures.len()
    )]
    OrchestrationTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
        /// Whatever had completed before the deadline.
        partial: Box<InvocationResult>,
    },

    /// `start()` was called on a runtime that is already running.
    #[error("Runtime already started")]
    AlreadyStarted,

    /// Work was dispatched to a runtime that is stopping or stopped.
    #[error("Runtime is stopped")]
    RuntimeStopped,

    /// Work was dispatched to a runtime that was never started.
    #[error("Runtime has not been started")]
    RuntimeNotStarted,

    /// An error from the execution substrate (task join failure, missing executor).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request (e.g. a model API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error raised by a skill during invocation.
    #[error("Skill error: {0}")]
    Skill(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConcertoError {
    /// Wrap any displayable cause as a [`ConcertoError::ExternalCall`] for `worker`.
    pub fn external(worker: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::ExternalCall {
            worker: worker.into(),
            cause: cause.to_string(),
        }
    }

    /// Attribute this error to `worker`.
    ///
    /// An error that already is an `ExternalCall` passes through untouched, so
    /// nested workers keep the innermost attribution.
    pub fn into_external(self, worker: &str) -> Self {
        match self {
            e @ Self::ExternalCall { .. } => e,
            other => Self::external(worker, other),
        }
    }

    /// Returns the partial result carried by a timeout, if any.
    pub fn partial_result(&self) -> Option<&InvocationResult> {
        match self {
            Self::OrchestrationTimeout { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::task::Response;

    #[test]
    fn test_external_call_display() {
        let err = ConcertoError::external("PhysicsExpert", "HTTP 503");
        assert_eq!(
            err.to_string(),
            "External call failed for worker 'PhysicsExpert': HTTP 503"
        );
    }

    #[test]
    fn test_into_external_keeps_existing_attribution() {
        let inner = ConcertoError::external("Inner", "boom");
        match inner.into_external("Outer") {
            ConcertoError::ExternalCall { worker, .. } => assert_eq!(worker, "Inner"),
            other => panic!("unexpected: {other}"),
        }

        match ConcertoError::Http("429".into()).into_external("Outer") {
            ConcertoError::ExternalCall { worker, cause } => {
                assert_eq!(worker, "Outer");
                assert!(cause.contains("429"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_timeout_carries_partial() {
        let mut partial = InvocationResult::new(uuid::Uuid::new_v4());
        partial.responses.push(Response::new("A", "fast"));
        let err = ConcertoError::OrchestrationTimeout {
            timeout: Duration::from_millis(100),
            partial: Box::new(partial),
        };
        assert!(err.to_string().contains("1 responses"));
        assert_eq!(err.partial_result().unwrap().responses[0].worker_name, "A");
        assert!(ConcertoError::EmptyMembers.partial_result().is_none());
    }
}
