use serde::{Deserialize, Serialize};

/// A request from a model to invoke a named capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the model for this call.
    pub id: String,
    /// Name of the capability to invoke.
    pub name: String,
    /// JSON arguments to pass to the capability.
    pub arguments: serde_json::Value,
}

/// The result returned after executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The ID of the [`ToolCall`] this result answers.
    pub call_id: String,
    /// Textual output produced by the capability.
    pub content: String,
    /// Whether execution ended in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful tool result.
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Creates an error tool result.
    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("call_1", "octocat");
        assert!(!result.is_error);
        assert_eq!(result.content, "octocat");
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error("call_1", "not found");
        assert!(result.is_error);
        assert_eq!(result.call_id, "call_1");
    }
}
