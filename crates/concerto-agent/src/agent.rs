use crate::backends::LlmBackend;
use crate::config::{AgentProfile, ModelConfig};
use crate::context::ContextWindow;
use crate::llm::{LlmClient, LlmResponse};
use async_trait::async_trait;
use concerto_core::{ConcertoError, ConcertoResult, Message, Response, Role, Task, Worker};
use concerto_skills::SkillRegistry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const TASK_CONTEXT_MESSAGES: usize = 100;

/// A worker that answers by calling a chat-completion model.
///
/// The agent's instructions become the system prompt. When the model asks for
/// a capability from the agent's [`SkillRegistry`], the call is executed and its
/// result is fed back. This repeats until the model produces a final answer or
/// `max_turns` is reached.
pub struct ChatCompletionAgent {
    name: String,
    description: String,
    instructions: String,
    llm: LlmClient,
    skills: Arc<SkillRegistry>,
    max_turns: u32,
}

impl ChatCompletionAgent {
    /// Build an agent from a profile, using the profile's model override if present.
    pub fn new(profile: &AgentProfile, shared_model: &ModelConfig) -> Self {
        let model = profile
            .model
            .clone()
            .unwrap_or_else(|| shared_model.clone());
        let max_turns = model.max_turns;
        Self {
            name: profile.name.clone(),
            description: profile.description.clone(),
            instructions: profile.instructions.clone(),
            llm: LlmClient::new(model),
            skills: Arc::new(SkillRegistry::new()),
            max_turns,
        }
    }

    /// Build an agent over a pre-built backend.
    pub fn from_backend(
        name: impl Into<String>,
        instructions: impl Into<String>,
        backend: Box<dyn LlmBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            llm: LlmClient::from_backend(backend),
            skills: Arc::new(SkillRegistry::new()),
            max_turns: 10,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_skills(mut self, skills: Arc<SkillRegistry>) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn skills(&self) -> &Arc<SkillRegistry> {
        &self.skills
    }

    /// Continue a multi-turn conversation held in `context`.
    ///
    /// The user input and the final answer are appended to the context, so
    /// later calls see the whole exchange (up to the window size).
    pub async fn chat(&self, context: &mut ContextWindow, user_input: &str) -> ConcertoResult<String> {
        if context.system_prompt().is_none() {
            context.set_system_prompt(&self.instructions);
        }
        context.push_user(user_input);
        self.run_loop(context).await
    }

    /// The agentic loop: prompt → model → tool calls → backfill → repeat.
    async fn run_loop(&self, context: &mut ContextWindow) -> ConcertoResult<String> {
        let thread_id = context.thread_id();
        let tool_descriptors: Vec<_> = self
            .skills
            .list_descriptors()
            .into_iter()
            .cloned()
            .collect();

        for turn in 0..self.max_turns {
            let response = self
                .llm
                .chat(context.system_prompt(), context.messages(), &tool_descriptors)
                .await?;

            match response {
                LlmResponse::Done(text) => {
                    context.push(Message::assistant(&text, thread_id).with_name(&self.name));
                    info!(agent = %self.name, turns = turn + 1, "Agent produced final answer");
                    return Ok(text);
                }

                LlmResponse::Text(text) => {
                    context.push(Message::assistant(&text, thread_id).with_name(&self.name));
                }

                LlmResponse::ToolUse {
                    content,
                    tool_calls,
                } => {
                    if let Some(text) = content {
                        context.push(Message::assistant(text, thread_id).with_name(&self.name));
                    }

                    for call in tool_calls {
                        info!(agent = %self.name, tool = %call.name, call_id = %call.id, "Executing tool call");
                        let tool_name = call.name.clone();

                        let backfill = match self.skills.execute(call).await {
                            Ok(result) => serde_json::json!({
                                "type": "tool_result",
                                "tool_use_id": result.call_id,
                                "content": result.content,
                                "is_error": result.is_error,
                            })
                            .to_string(),
                            Err(e) => {
                                error!(agent = %self.name, tool = %tool_name, error = %e, "Tool execution failed");
                                format!("Tool error: {e}")
                            }
                        };
                        context.push(Message::new(Role::Tool, backfill, thread_id));
                    }
                }
            }
        }

        warn!(agent = %self.name, max_turns = self.max_turns, "Agent reached max turns");
        Err(ConcertoError::external(
            &self.name,
            format!("exceeded maximum of {} turns", self.max_turns),
        ))
    }
}

#[async_trait]
impl Worker for ChatCompletionAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn respond(&self, task: &Task) -> ConcertoResult<Response> {
        let start = Instant::now();
        let mut context = ContextWindow::new(TASK_CONTEXT_MESSAGES);
        context.set_system_prompt(&self.instructions);
        context.push_user(task.as_str());

        let content = self
            .run_loop(&mut context)
            .await
            .map_err(|e| e.into_external(&self.name))?;

        info!(
            agent = %self.name,
            duration_ms = start.elapsed().as_millis() as u64,
            "Agent responded"
        );
        Ok(Response::new(&self.name, content))
    }
}
