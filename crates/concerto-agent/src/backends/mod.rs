pub mod openai;

use crate::llm::LlmResponse;
use async_trait::async_trait;
use concerto_core::{ConcertoResult, Message};
use concerto_skills::SkillDescriptor;

/// Trait for LLM provider backends.
///
/// Every provider speaks a request/response chat API: a system prompt, the
/// conversation so far, and the capabilities the model may call. Tests and
/// custom providers implement this directly and hand it to
/// [`LlmClient::from_backend`](crate::LlmClient::from_backend).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> ConcertoResult<LlmResponse>;
}
