//! Concurrent multi-agent orchestration over an explicit in-process runtime.
//!
//! One task is dispatched to every member of an orchestration, the members run
//! concurrently on an [`InProcessRuntime`], and their responses are collected
//! behind a barrier that resolves when every member finished or a timeout
//! elapsed. Result order is completion order and carries no meaning.
//!
//! # Main types
//!
//! - [`InProcessRuntime`]: Lifecycle, dispatch, and in-flight registry for worker runs.
//! - [`ConcurrentOrchestration`]: Fan-out/fan-in of one task to N workers.
//! - [`OrchestrationHandle`]: Barrier over one concurrent invocation.
//! - [`GroupChatOrchestration`]: Managed turn-taking conversation between workers.
//! - [`RuntimeMonitor`]: Per-worker status and metrics.

/// Fan-out/fan-in orchestration.
pub mod concurrent;
/// Managed group chat orchestration.
pub mod group_chat;
/// Worker status and metrics tracking.
pub mod monitor;
/// Runtime lifecycle and dispatch.
pub mod runtime;
/// Shared runtime and orchestration types.
pub mod types;

pub use concurrent::{ConcurrentOrchestration, OrchestrationHandle, ResponseCallback};
pub use group_chat::{
    GroupChatHandle, GroupChatManager, GroupChatOrchestration, GroupChatResult,
    RoundRobinGroupChatManager,
};
pub use monitor::RuntimeMonitor;
pub use runtime::{InProcessRuntime, Invocation, WorkHandle};
pub use types::{
    FailurePolicy, RuntimeConfig, RuntimeState, WorkUnit, WorkerMetrics, WorkerState,
    WorkerStatus,
};
