use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::llm::LlmResponse;
use async_trait::async_trait;
use concerto_core::{ConcertoError, ConcertoResult, Message, Role, ToolCall};
use concerto_skills::SkillDescriptor;
use tracing::debug;

/// OpenAI-compatible chat completions backend.
///
/// Serves OpenAI, OpenRouter, Groq and Azure OpenAI. Azure differs only in
/// the URL shape (deployment path plus `api-version`) and the `api-key`
/// header.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        match self.config.provider {
            LlmProvider::AzureOpenAi => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.base_url(),
                self.config.model_id,
                self.config.api_version()
            ),
            _ => format!("{}/v1/chat/completions", self.config.base_url()),
        }
    }

    fn build_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> Vec<serde_json::Value> {
        let mut api_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for m in messages {
            let role = match m.role {
                Role::System => continue,
                Role::User | Role::Tool => "user",
                Role::Assistant => "assistant",
            };
            let mut entry = serde_json::json!({
                "role": role,
                "content": m.content
            });
            if let Some(name) = &m.name {
                entry["name"] = serde_json::json!(sanitize_name(name));
            }
            api_messages.push(entry);
        }

        api_messages
    }

    fn build_tools(&self, tools: &[SkillDescriptor]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = match self.config.provider {
            LlmProvider::AzureOpenAi => request.header("api-key", &self.config.api_key),
            _ => request.header("Authorization", format!("Bearer {}", self.config.api_key)),
        };
        let request = request.header("Content-Type", "application/json");

        if self.config.provider == LlmProvider::OpenRouter {
            request.header("X-Title", "Concerto")
        } else {
            request
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> ConcertoResult<LlmResponse> {
        let url = self.endpoint();
        let api_messages = self.build_messages(system_prompt, messages);

        let mut body = serde_json::json!({
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": api_messages,
        });
        // Azure takes the model from the deployment path.
        if self.config.provider != LlmProvider::AzureOpenAi {
            body["model"] = serde_json::json!(self.config.model_id);
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
        }

        debug!(url = %url, messages = messages.len(), tools = tools.len(), "Sending chat completion");

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConcertoError::Http(format!("request timeout: {e}"))
                } else {
                    ConcertoError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ConcertoError::Http(format!("HTTP {status}: unreadable body: {e}")))?;

        if !status.is_success() {
            return Err(ConcertoError::Http(format!(
                "chat completion failed with HTTP {}: {}",
                status.as_u16(),
                resp_body
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// The `name` field only accepts `[A-Za-z0-9_-]`.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn parse_openai_response(body: &serde_json::Value) -> ConcertoResult<LlmResponse> {
    let choice = body["choices"].get(0).ok_or_else(|| {
        ConcertoError::Http(format!("chat completion response has no choices: {body}"))
    })?;
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    if let Some(tool_calls_json) = message["tool_calls"].as_array() {
        let tool_calls: Vec<ToolCall> = tool_calls_json
            .iter()
            .filter_map(|tc| {
                let id = tc["id"].as_str()?.to_string();
                let name = tc["function"]["name"].as_str()?.to_string();
                let arguments: serde_json::Value =
                    serde_json::from_str(tc["function"]["arguments"].as_str()?).unwrap_or_default();
                Some(ToolCall {
                    id,
                    name,
                    arguments,
                })
            })
            .collect();

        if !tool_calls.is_empty() {
            return Ok(LlmResponse::ToolUse {
                content: if content.is_empty() {
                    None
                } else {
                    Some(content)
                },
                tool_calls,
            });
        }
    }

    let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop");
    if finish_reason == "stop" {
        Ok(LlmResponse::Done(content))
    } else {
        Ok(LlmResponse::Text(content))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_azure_endpoint_shape() {
        let mut config = ModelConfig::new(LlmProvider::AzureOpenAi, "gpt4o-deploy", "k")
            .with_base_url("https://res.openai.azure.com");
        config.api_version = Some("2024-10-21".into());
        let backend = OpenAiBackend::new(config);
        assert_eq!(
            backend.endpoint(),
            "https://res.openai.azure.com/openai/deployments/gpt4o-deploy/chat/completions?api-version=2024-10-21"
        );
    }

    #[test]
    fn test_openai_endpoint_shape() {
        let backend = OpenAiBackend::new(ModelConfig::new(LlmProvider::Groq, "llama", "k"));
        assert_eq!(
            backend.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_done() {
        let body = json!({
            "choices": [{"message": {"content": "42"}, "finish_reason": "stop"}]
        });
        assert!(matches!(parse_openai_response(&body).unwrap(), LlmResponse::Done(t) if t == "42"));
    }

    #[test]
    fn test_parse_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "get_user", "arguments": "{\"login\":\"octocat\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        match parse_openai_response(&body).unwrap() {
            LlmResponse::ToolUse {
                content,
                tool_calls,
            } => {
                assert!(content.is_none());
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].name, "get_user");
                assert_eq!(tool_calls[0].arguments["login"], "octocat");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_length_truncation_is_text() {
        let body = json!({
            "choices": [{"message": {"content": "partial"}, "finish_reason": "length"}]
        });
        assert!(matches!(parse_openai_response(&body).unwrap(), LlmResponse::Text(_)));
    }

    #[test]
    fn test_parse_without_choices_fails() {
        assert!(parse_openai_response(&json!({"error": "x"})).is_err());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Physics Expert!"), "Physics_Expert_");
    }
}
