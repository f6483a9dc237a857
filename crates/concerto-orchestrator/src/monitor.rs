use crate::types::{WorkerMetrics, WorkerState, WorkerStatus};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Tracks status and metrics for every worker the runtime has run.
///
/// Workers are keyed by name and registered on their first run. Updates are
/// synchronous so they can be recorded from drop guards when a run is aborted.
pub struct RuntimeMonitor {
    states: RwLock<HashMap<String, WorkerState>>,
}

impl RuntimeMonitor {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Mark a worker as working on one more run.
    pub fn start_run(&self, worker_name: &str) {
        let mut states = self.states.write();
        let state = states
            .entry(worker_name.to_string())
            .or_insert_with(|| WorkerState {
                worker_name: worker_name.to_string(),
                status: WorkerStatus::Idle,
                in_flight: 0,
                metrics: WorkerMetrics::default(),
            });
        state.in_flight += 1;
        state.status = WorkerStatus::Working;
    }

    /// Record a completed run, successful or not.
    pub fn finish_run(&self, worker_name: &str, duration_ms: u64, succeeded: bool) {
        let mut states = self.states.write();
        if let Some(state) = states.get_mut(worker_name) {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.metrics.runs += 1;
            state.metrics.duration_ms += duration_ms;
            if !succeeded {
                state.metrics.failures += 1;
                state.status = WorkerStatus::Error;
            } else if state.in_flight == 0 {
                state.status = WorkerStatus::Idle;
            }
        }
    }

    /// Record a run that was aborted before it produced a result.
    pub fn cancel_run(&self, worker_name: &str) {
        let mut states = self.states.write();
        if let Some(state) = states.get_mut(worker_name) {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.metrics.cancellations += 1;
            if state.in_flight == 0 && state.status == WorkerStatus::Working {
                state.status = WorkerStatus::Idle;
            }
        }
    }

    /// Get a snapshot of all worker states, sorted by name.
    pub fn snapshot(&self) -> Vec<WorkerState> {
        let states = self.states.read();
        let mut snapshot: Vec<_> = states.values().cloned().collect();
        snapshot.sort_by(|a, b| a.worker_name.cmp(&b.worker_name));
        snapshot
    }

    pub fn get_state(&self, worker_name: &str) -> Option<WorkerState> {
        self.states.read().get(worker_name).cloned()
    }

    /// Get aggregate metrics across all workers.
    pub fn aggregate_metrics(&self) -> WorkerMetrics {
        let states = self.states.read();
        let mut total = WorkerMetrics::default();
        for state in states.values() {
            total.runs += state.metrics.runs;
            total.failures += state.metrics.failures;
            total.cancellations += state.metrics.cancellations;
            total.duration_ms += state.metrics.duration_ms;
        }
        total
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "workers": self.snapshot(),
            "aggregate": self.aggregate_metrics(),
        })
    }
}

impl Default for RuntimeMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_empty() {
        let monitor = RuntimeMonitor::new();
        assert!(monitor.snapshot().is_empty());
        assert!(monitor.get_state("PhysicsExpert").is_none());
    }

    #[test]
    fn test_start_and_finish_run() {
        let monitor = RuntimeMonitor::new();
        monitor.start_run("PhysicsExpert");
        let state = monitor.get_state("PhysicsExpert").unwrap();
        assert_eq!(state.status, WorkerStatus::Working);
        assert_eq!(state.in_flight, 1);

        monitor.finish_run("PhysicsExpert", 120, true);
        let state = monitor.get_state("PhysicsExpert").unwrap();
        assert_eq!(state.status, WorkerStatus::Idle);
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.metrics.runs, 1);
        assert_eq!(state.metrics.duration_ms, 120);
    }

    #[test]
    fn test_failed_run_sets_error() {
        let monitor = RuntimeMonitor::new();
        monitor.start_run("ChemistryExpert");
        monitor.finish_run("ChemistryExpert", 5, false);
        let state = monitor.get_state("ChemistryExpert").unwrap();
        assert_eq!(state.status, WorkerStatus::Error);
        assert_eq!(state.metrics.failures, 1);
    }

    #[test]
    fn test_overlapping_runs_stay_working() {
        let monitor = RuntimeMonitor::new();
        monitor.start_run("Writer");
        monitor.start_run("Writer");
        monitor.finish_run("Writer", 10, true);
        assert_eq!(
            monitor.get_state("Writer").unwrap().status,
            WorkerStatus::Working
        );
        monitor.cancel_run("Writer");
        let state = monitor.get_state("Writer").unwrap();
        assert_eq!(state.status, WorkerStatus::Idle);
        assert_eq!(state.metrics.cancellations, 1);
    }

    #[test]
    fn test_aggregate_and_json() {
        let monitor = RuntimeMonitor::new();
        monitor.start_run("b");
        monitor.finish_run("b", 10, true);
        monitor.start_run("a");
        monitor.finish_run("a", 20, false);

        let total = monitor.aggregate_metrics();
        assert_eq!(total.runs, 2);
        assert_eq!(total.failures, 1);
        assert_eq!(total.duration_ms, 30);

        let json = monitor.to_json();
        assert_eq!(json["workers"][0]["worker_name"], "a");
        assert_eq!(json["workers"][0]["status"], "error");
        assert_eq!(json["aggregate"]["runs"], 2);
    }
}
