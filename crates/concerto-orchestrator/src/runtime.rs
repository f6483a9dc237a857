use crate::monitor::RuntimeMonitor;
use crate::types::{RuntimeConfig, RuntimeState, WorkUnit};
use chrono::Utc;
use concerto_core::{ConcertoError, ConcertoResult, Response, Task, Worker};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct Lifecycle {
    state: RuntimeState,
    executor: Option<Handle>,
    permits: Option<Arc<Semaphore>>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    lifecycle: Mutex<Lifecycle>,
    registry: Mutex<HashMap<Uuid, WorkUnit>>,
    /// Open invocations plus dispatched runs that have not finished.
    pending: watch::Sender<usize>,
    monitor: RuntimeMonitor,
}

/// Executes worker runs on the ambient tokio runtime.
///
/// The runtime has an explicit lifecycle: it must be [`start`](Self::start)ed
/// before work is dispatched, and [`stop_when_idle`](Self::stop_when_idle)
/// refuses new work and waits for everything pending to finish. A stopped
/// runtime can be started again.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct InProcessRuntime {
    inner: Arc<RuntimeInner>,
}

impl InProcessRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                lifecycle: Mutex::new(Lifecycle {
                    state: RuntimeState::Created,
                    executor: None,
                    permits: None,
                }),
                registry: Mutex::new(HashMap::new()),
                pending,
                monitor: RuntimeMonitor::new(),
            }),
        }
    }

    /// Begin accepting work.
    ///
    /// Must be called from within a tokio runtime; dispatched runs are spawned
    /// onto it.
    pub fn start(&self) -> ConcertoResult<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        match lifecycle.state {
            RuntimeState::Started | RuntimeState::Stopping => {
                return Err(ConcertoError::AlreadyStarted)
            }
            RuntimeState::Created | RuntimeState::Stopped => {}
        }

        let executor = Handle::try_current().map_err(|e| {
            ConcertoError::Runtime(format!("runtime must be started inside tokio: {e}"))
        })?;
        lifecycle.executor = Some(executor);
        lifecycle.permits = self
            .inner
            .config
            .max_concurrent_workers
            .map(|max| Arc::new(Semaphore::new(max.max(1))));
        lifecycle.state = RuntimeState::Started;

        info!(
            max_concurrent_workers = ?self.inner.config.max_concurrent_workers,
            "Runtime started"
        );
        Ok(())
    }

    /// Refuse new work, then wait until every open invocation and in-flight
    /// run has finished.
    ///
    /// Returns immediately if the runtime is already stopped. An invocation
    /// stays pending until its handle is resolved or dropped.
    pub async fn stop_when_idle(&self) -> ConcertoResult<()> {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                RuntimeState::Created => return Err(ConcertoError::RuntimeNotStarted),
                RuntimeState::Stopped => return Ok(()),
                RuntimeState::Started => lifecycle.state = RuntimeState::Stopping,
                RuntimeState::Stopping => {}
            }
        }

        info!(pending = self.pending_count(), "Runtime stopping, waiting for pending work");

        let mut pending = self.inner.pending.subscribe();
        loop {
            pending
                .wait_for(|count| *count == 0)
                .await
                .map(|_| ())
                .map_err(|e| ConcertoError::Runtime(e.to_string()))?;

            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                RuntimeState::Stopping => {
                    lifecycle.state = RuntimeState::Stopped;
                    lifecycle.executor = None;
                    lifecycle.permits = None;
                    info!("Runtime stopped");
                    return Ok(());
                }
                RuntimeState::Stopped | RuntimeState::Created => return Ok(()),
                // Restarted by someone else while this caller waited.
                RuntimeState::Started => {
                    lifecycle.state = RuntimeState::Stopping;
                    debug!("Runtime restarted while stopping, stopping again");
                }
            }
        }
    }

    /// Dispatch a single run of `worker` on `task`.
    pub fn run(&self, worker: Arc<dyn Worker>, task: Task) -> ConcertoResult<WorkHandle> {
        self.dispatch(worker, task, None)
    }

    /// Open an invocation: a unit of pending work that may dispatch several
    /// runs. The runtime does not become idle until the invocation is dropped.
    pub fn begin_invocation(&self) -> ConcertoResult<Invocation> {
        let (executor, pending) = {
            let lifecycle = self.inner.lifecycle.lock();
            Self::accepting(lifecycle.state, false)?;
            let executor = lifecycle
                .executor
                .clone()
                .ok_or(ConcertoError::RuntimeNotStarted)?;
            (executor, PendingGuard::new(&self.inner))
        };

        let id = Uuid::new_v4();
        debug!(invocation_id = %id, "Invocation opened");
        Ok(Invocation {
            id,
            runtime: self.clone(),
            executor,
            _pending: pending,
        })
    }

    pub fn state(&self) -> RuntimeState {
        self.inner.lifecycle.lock().state
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn monitor(&self) -> &RuntimeMonitor {
        &self.inner.monitor
    }

    /// Number of open invocations plus unfinished runs.
    pub fn pending_count(&self) -> usize {
        *self.inner.pending.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_count() == 0
    }

    /// Snapshot of the runs currently registered, oldest first.
    pub fn in_flight(&self) -> Vec<WorkUnit> {
        let mut units: Vec<_> = self.inner.registry.lock().values().cloned().collect();
        units.sort_by_key(|unit| unit.started_at);
        units
    }

    fn accepting(state: RuntimeState, within_invocation: bool) -> ConcertoResult<()> {
        match state {
            RuntimeState::Started => Ok(()),
            RuntimeState::Stopping if within_invocation => Ok(()),
            RuntimeState::Created => Err(ConcertoError::RuntimeNotStarted),
            RuntimeState::Stopping | RuntimeState::Stopped => Err(ConcertoError::RuntimeStopped),
        }
    }

    fn dispatch(
        &self,
        worker: Arc<dyn Worker>,
        task: Task,
        invocation_id: Option<Uuid>,
    ) -> ConcertoResult<WorkHandle> {
        let (executor, permits, pending) = {
            let lifecycle = self.inner.lifecycle.lock();
            Self::accepting(lifecycle.state, invocation_id.is_some())?;
            let executor = lifecycle
                .executor
                .clone()
                .ok_or(ConcertoError::RuntimeNotStarted)?;
            (executor, lifecycle.permits.clone(), PendingGuard::new(&self.inner))
        };

        let unit = WorkUnit {
            id: Uuid::new_v4(),
            worker_name: worker.name().to_string(),
            invocation_id,
            started_at: Utc::now(),
        };
        let unit_id = unit.id;
        let worker_name = unit.worker_name.clone();
        self.inner.registry.lock().insert(unit_id, unit);
        debug!(worker = %worker_name, unit_id = %unit_id, "Run dispatched");

        // Built before spawning so an abort ahead of the first poll still
        // unregisters the run.
        let mut registration = Registration {
            inner: Arc::clone(&self.inner),
            unit_id,
            worker_name: worker_name.clone(),
            started: false,
            finished: false,
            _pending: pending,
        };
        let join = executor.spawn(async move {
            let _permit = match permits {
                Some(permits) => Some(permits.acquire_owned().await.map_err(|e| {
                    ConcertoError::Runtime(format!("concurrency limiter closed: {e}"))
                })?),
                None => None,
            };

            registration.inner.monitor.start_run(&registration.worker_name);
            registration.started = true;
            let start = Instant::now();

            let result = worker
                .respond(&task)
                .await
                .map_err(|e| e.into_external(&registration.worker_name));

            let duration_ms = start.elapsed().as_millis() as u64;
            registration.inner.monitor.finish_run(
                &registration.worker_name,
                duration_ms,
                result.is_ok(),
            );
            registration.finished = true;
            if let Err(e) = &result {
                warn!(worker = %registration.worker_name, error = %e, "Worker run failed");
            }
            result
        });

        Ok(WorkHandle {
            unit_id,
            worker_name,
            join,
        })
    }
}

impl Default for InProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts as pending work until dropped.
struct PendingGuard {
    pending: watch::Sender<usize>,
}

impl PendingGuard {
    fn new(inner: &RuntimeInner) -> Self {
        inner.pending.send_modify(|count| *count += 1);
        Self {
            pending: inner.pending.clone(),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// Removes a run from the registry when its task ends, however it ends.
///
/// The pending count is released after the registry entry is gone.
struct Registration {
    inner: Arc<RuntimeInner>,
    unit_id: Uuid,
    worker_name: String,
    started: bool,
    finished: bool,
    _pending: PendingGuard,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.registry.lock().remove(&self.unit_id);
        if self.started && !self.finished {
            self.inner.monitor.cancel_run(&self.worker_name);
            debug!(worker = %self.worker_name, unit_id = %self.unit_id, "Run cancelled");
        }
    }
}

/// An open unit of pending work on an [`InProcessRuntime`].
///
/// Runs dispatched through an invocation are accepted while the runtime is
/// stopping, so a multi-step orchestration can finish what it started.
pub struct Invocation {
    id: Uuid,
    runtime: InProcessRuntime,
    executor: Handle,
    _pending: PendingGuard,
}

impl Invocation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn run(&self, worker: Arc<dyn Worker>, task: Task) -> ConcertoResult<WorkHandle> {
        self.runtime.dispatch(worker, task, Some(self.id))
    }

    /// Hand the invocation to a driver future spawned on the runtime's executor.
    pub(crate) fn spawn_driver<F, Fut>(self, driver: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce(Invocation) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let executor = self.executor.clone();
        executor.spawn(driver(self))
    }
}

/// Handle to one dispatched worker run.
///
/// Dropping the handle detaches the run; it keeps executing.
pub struct WorkHandle {
    unit_id: Uuid,
    worker_name: String,
    join: JoinHandle<ConcertoResult<Response>>,
}

impl WorkHandle {
    pub fn id(&self) -> Uuid {
        self.unit_id
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.join.abort_handle()
    }

    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run's outcome.
    ///
    /// Aborted and panicked runs are reported as failures of the worker.
    pub async fn join(self) -> ConcertoResult<Response> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ConcertoError::external(&self.worker_name, "cancelled")),
            Err(e) => Err(ConcertoError::external(
                &self.worker_name,
                format!("worker panicked: {e}"),
            )),
        }
    }
}
