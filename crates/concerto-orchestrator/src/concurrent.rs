use crate::runtime::{InProcessRuntime, Invocation};
use crate::types::FailurePolicy;
use concerto_core::{
    ConcertoError, ConcertoResult, InvocationResult, Response, Task, Worker, WorkerFailure,
};
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Observer called once per successful response, in completion order.
pub type ResponseCallback = Arc<dyn Fn(&Response) + Send + Sync>;

type PendingRun = BoxFuture<'static, (String, ConcertoResult<Response>)>;

/// Sends the same task to every member concurrently and collects whatever
/// each one returns.
///
/// Members never see each other's output. The orchestration itself holds no
/// per-invocation state, so it can be invoked any number of times, including
/// concurrently.
pub struct ConcurrentOrchestration {
    members: Vec<Arc<dyn Worker>>,
    failure_policy: FailurePolicy,
    response_callback: Option<ResponseCallback>,
}

impl ConcurrentOrchestration {
    pub fn new(members: Vec<Arc<dyn Worker>>) -> Self {
        Self {
            members,
            failure_policy: FailurePolicy::default(),
            response_callback: None,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_response_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.response_callback = Some(Arc::new(callback));
        self
    }

    pub fn members(&self) -> &[Arc<dyn Worker>] {
        &self.members
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Dispatch `task` to every member and return immediately.
    ///
    /// Fails with [`ConcertoError::EmptyMembers`] before touching the runtime
    /// when there are no members, and with a lifecycle error when the runtime
    /// is not accepting work.
    pub fn invoke(&self, task: Task, runtime: &InProcessRuntime) -> ConcertoResult<OrchestrationHandle> {
        if self.members.is_empty() {
            return Err(ConcertoError::EmptyMembers);
        }

        let invocation = runtime.begin_invocation()?;
        let mut pending = FuturesUnordered::new();
        let mut aborts = Vec::with_capacity(self.members.len());

        for member in &self.members {
            let work = match invocation.run(Arc::clone(member), task.clone()) {
                Ok(work) => work,
                Err(e) => {
                    aborts.iter().for_each(AbortHandle::abort);
                    return Err(e);
                }
            };
            aborts.push(work.abort_handle());
            let worker_name = work.worker_name().to_string();
            let run: PendingRun = async move { (worker_name, work.join().await) }.boxed();
            pending.push(run);
        }

        info!(
            invocation_id = %invocation.id(),
            members = self.members.len(),
            "Concurrent orchestration dispatched"
        );

        Ok(OrchestrationHandle {
            result: InvocationResult::new(invocation.id()),
            invocation: Some(invocation),
            pending,
            aborts,
            dispatched: self.members.len(),
            failure_policy: self.failure_policy,
            response_callback: self.response_callback.clone(),
            started: Instant::now(),
        })
    }
}

/// Barrier over one concurrent invocation.
///
/// Dropping the handle before the barrier resolves aborts every run that is
/// still outstanding.
pub struct OrchestrationHandle {
    invocation: Option<Invocation>,
    pending: FuturesUnordered<PendingRun>,
    aborts: Vec<AbortHandle>,
    result: InvocationResult,
    dispatched: usize,
    failure_policy: FailurePolicy,
    response_callback: Option<ResponseCallback>,
    started: Instant,
}

impl OrchestrationHandle {
    pub fn invocation_id(&self) -> Uuid {
        self.result.invocation_id
    }

    /// Number of members the task was dispatched to.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Wait until every member has finished or `timeout` elapses.
    ///
    /// On timeout the outstanding runs are aborted and
    /// [`ConcertoError::OrchestrationTimeout`] carries whatever completed
    /// before the deadline.
    pub async fn get(self, timeout: Duration) -> ConcertoResult<InvocationResult> {
        self.collect(Some(timeout)).await
    }

    /// Wait until every member has finished, however long that takes.
    pub async fn join(self) -> ConcertoResult<InvocationResult> {
        self.collect(None).await
    }

    /// Abort every outstanding run and return what has been collected so far.
    pub fn cancel(mut self) -> InvocationResult {
        self.abort_outstanding();
        warn!(
            invocation_id = %self.result.invocation_id,
            collected = self.result.len(),
            "Concurrent orchestration cancelled"
        );
        self.take_result()
    }

    async fn collect(mut self, timeout: Option<Duration>) -> ConcertoResult<InvocationResult> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

        loop {
            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.pending.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            self.abort_outstanding();
                            warn!(
                                invocation_id = %self.result.invocation_id,
                                outstanding = self.pending.len(),
                                collected = self.result.len(),
                                "Concurrent orchestration timed out"
                            );
                            return Err(ConcertoError::OrchestrationTimeout {
                                timeout: timeout.unwrap_or_default(),
                                partial: Box::new(self.take_result()),
                            });
                        }
                    }
                }
                None => self.pending.next().await,
            };

            let Some((worker_name, outcome)) = next else {
                break;
            };

            match outcome {
                Ok(response) => {
                    if let Some(callback) = &self.response_callback {
                        callback(&response);
                    }
                    self.result.responses.push(response);
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::IsolateAndContinue => {
                        self.result
                            .failures
                            .push(WorkerFailure::new(&worker_name, failure_cause(&e)));
                    }
                    FailurePolicy::FailFast => {
                        self.abort_outstanding();
                        warn!(
                            invocation_id = %self.result.invocation_id,
                            worker = %worker_name,
                            error = %e,
                            "Worker failed, aborting remaining workers"
                        );
                        return Err(e.into_external(&worker_name));
                    }
                },
            }
        }

        info!(
            invocation_id = %self.result.invocation_id,
            responses = self.result.responses.len(),
            failures = self.result.failures.len(),
            duration_ms = self.started.elapsed().as_millis() as u64,
            "Concurrent orchestration completed"
        );
        Ok(self.take_result())
    }

    fn abort_outstanding(&self) {
        for abort in &self.aborts {
            abort.abort();
        }
    }

    fn take_result(&mut self) -> InvocationResult {
        let id = self.result.invocation_id;
        std::mem::replace(&mut self.result, InvocationResult::new(id))
    }
}

impl Drop for OrchestrationHandle {
    fn drop(&mut self) {
        self.abort_outstanding();
        // Release the invocation only after the aborts were requested.
        self.invocation.take();
    }
}

fn failure_cause(err: &ConcertoError) -> String {
    match err {
        ConcertoError::ExternalCall { cause, .. } => cause.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        delay_ms: u64,
        fail: bool,
    }

    #[async_trait]
    impl Worker for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn respond(&self, _task: &Task) -> ConcertoResult<Response> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.fail {
                Err(ConcertoError::Http("HTTP 503 unavailable".into()))
            } else {
                Ok(Response::new(self.name, format!("{} answer", self.name)))
            }
        }
    }

    fn member(name: &'static str, delay_ms: u64, fail: bool) -> Arc<dyn Worker> {
        Arc::new(Fixed {
            name,
            delay_ms,
            fail,
        })
    }

    #[tokio::test]
    async fn test_empty_members_rejected_before_runtime() {
        // Never started: EmptyMembers must win over RuntimeNotStarted.
        let runtime = InProcessRuntime::new();
        let orchestration = ConcurrentOrchestration::new(Vec::new());
        let err = orchestration
            .invoke(Task::new("x").unwrap(), &runtime)
            .err()
            .unwrap();
        assert!(matches!(err, ConcertoError::EmptyMembers));
        assert!(runtime.is_idle());
    }

    #[tokio::test]
    async fn test_failure_cause_is_isolated() {
        let runtime = InProcessRuntime::new();
        runtime.start().unwrap();
        let orchestration = ConcurrentOrchestration::new(vec![
            member("ok", 5, false),
            member("broken", 1, true),
        ]);

        let result = orchestration
            .invoke(Task::new("x").unwrap(), &runtime)
            .unwrap()
            .join()
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.failed("broken"));
        assert_eq!(result.failures[0].error, "HTTP error: HTTP 503 unavailable");
        runtime.stop_when_idle().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_returns_partial() {
        let runtime = InProcessRuntime::new();
        runtime.start().unwrap();
        let orchestration = ConcurrentOrchestration::new(vec![member("slow", 10_000, false)]);

        let handle = orchestration
            .invoke(Task::new("x").unwrap(), &runtime)
            .unwrap();
        assert_eq!(handle.dispatched(), 1);
        let partial = handle.cancel();
        assert!(partial.is_empty());

        runtime.stop_when_idle().await.unwrap();
        assert!(runtime.in_flight().is_empty());
    }
}
