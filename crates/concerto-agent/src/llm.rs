use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::ModelConfig;
use crate::failover::FailoverBackend;
use concerto_core::{ConcertoResult, Message, ToolCall};
use concerto_skills::SkillDescriptor;

/// Response from the LLM: final text, intermediate text, or a tool call request.
#[derive(Debug)]
pub enum LlmResponse {
    /// Text produced without a natural stop (e.g. truncated by `max_tokens`).
    Text(String),
    ToolUse {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// Final answer.
    Done(String),
}

/// LLM client that dispatches to the configured provider backend.
///
/// When the config carries fallback models or a retry policy, the primary
/// backend and its fallbacks are wrapped in a [`FailoverBackend`].
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        if config.fallback_models.is_empty() && config.retry_policy.is_none() {
            return Self {
                backend: Box::new(OpenAiBackend::new(config)),
            };
        }

        let policy = config.retry_policy.clone().unwrap_or_default();
        let mut backends: Vec<Box<dyn LlmBackend>> = Vec::new();
        for fallback in &config.fallback_models {
            backends.push(Box::new(OpenAiBackend::new(fallback.clone())));
        }
        backends.insert(0, Box::new(OpenAiBackend::new(config)));

        Self {
            backend: Box::new(FailoverBackend::new(backends, policy)),
        }
    }

    /// Create from a pre-built backend (custom providers, tests).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    pub async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> ConcertoResult<LlmResponse> {
        self.backend.chat(system_prompt, messages, tools).await
    }
}
