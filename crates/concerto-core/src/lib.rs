//! Core types and error definitions for the Concerto orchestration framework.
//!
//! This crate provides the foundational types shared across all Concerto crates:
//! the error taxonomy, the task and result model, the [`Worker`] contract, and
//! the chat message and tool call representations used by model-backed workers.
//!
//! # Main types
//!
//! - [`ConcertoError`]: Unified error enum for all Concerto subsystems.
//! - [`ConcertoResult`]: Convenience alias for `Result<T, ConcertoError>`.
//! - [`Task`]: Immutable, non-empty unit of work sent to every worker.
//! - [`Response`]: A single worker's answer to a task.
//! - [`InvocationResult`]: Unordered set of responses and failures from one invocation.
//! - [`Worker`]: Trait implemented by anything that can answer a task.
//! - [`Message`] / [`Role`]: Conversation messages exchanged with a model.
//! - [`ToolCall`] / [`ToolResult`]: Model-initiated capability invocations.

/// Error taxonomy.
pub mod error;
/// Conversation messages.
pub mod message;
/// Task, response, and invocation result model.
pub mod task;
/// Tool call request and result types.
pub mod tool;
/// The worker contract.
pub mod worker;

pub use error::{ConcertoError, ConcertoResult};
pub use message::{Message, Role};
pub use task::{InvocationResult, Response, Task, WorkerFailure};
pub use tool::{ToolCall, ToolResult};
pub use worker::Worker;
