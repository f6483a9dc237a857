use async_trait::async_trait;
use concerto_core::{ConcertoResult, ToolCall, ToolResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Metadata describing a skill's interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters_schema: serde_json::Value,
}

impl SkillDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
        }
    }

    /// Names listed under the schema's top-level `required` array.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters_schema["required"]
            .as_array()
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Trait that every capability implements.
#[async_trait]
pub trait Skill: Send + Sync {
    fn descriptor(&self) -> &SkillDescriptor;

    async fn execute(&self, call: ToolCall) -> ConcertoResult<ToolResult>;
}

type SkillFuture = Pin<Box<dyn Future<Output = ConcertoResult<String>> + Send>>;
type SkillFn = dyn Fn(serde_json::Value) -> SkillFuture + Send + Sync;

/// Adapts an async closure over the call arguments into a [`Skill`].
///
/// ```ignore
/// let echo = FnSkill::new(
///     SkillDescriptor::new("echo", "Echo the input", json!({"type": "object"})),
///     |args| async move { Ok(args.to_string()) },
/// );
/// ```
pub struct FnSkill {
    descriptor: SkillDescriptor,
    handler: Box<SkillFn>,
}

impl FnSkill {
    pub fn new<F, Fut>(descriptor: SkillDescriptor, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConcertoResult<String>> + Send + 'static,
    {
        Self {
            descriptor,
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Skill for FnSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> ConcertoResult<ToolResult> {
        let output = (self.handler)(call.arguments).await?;
        Ok(ToolResult::success(call.id, output))
    }
}
