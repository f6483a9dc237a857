//! Chat-completion agents that act as Concerto workers.
//!
//! An agent pairs a name and instructions with an LLM backend and an optional
//! capability registry. Calling [`ChatCompletionAgent::respond`] runs a bounded
//! prompt → model → tool call → model loop and returns the final answer.

pub mod agent;
pub mod backends;
pub mod config;
pub mod context;
pub mod failover;
pub mod llm;

pub use agent::ChatCompletionAgent;
pub use backends::LlmBackend;
pub use config::{AgentProfile, LlmProvider, ModelConfig};
pub use context::ContextWindow;
pub use failover::{FailoverBackend, RetryPolicy};
pub use llm::{LlmClient, LlmResponse};
