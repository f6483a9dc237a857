use crate::failover::RetryPolicy;
use concerto_core::{ConcertoError, ConcertoResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    /// Azure OpenAI: `model_id` is the deployment name, `api_base_url` the resource endpoint.
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    #[serde(rename = "openrouter")]
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible API.
    #[serde(rename = "groq")]
    Groq,
}

/// Connection and sampling settings for one model endpoint.
///
/// Built once at startup (usually from TOML) and checked with
/// [`ModelConfig::validate`] before any agent is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    /// Environment variable holding the key, consulted when `api_key` is empty.
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub api_base_url: Option<String>,
    /// Azure `api-version` query parameter.
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_turns() -> u32 {
    10
}

pub(crate) const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

impl ModelConfig {
    pub fn new(
        provider: LlmProvider,
        model_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_key: api_key.into(),
            api_key_env: None,
            api_base_url: None,
            api_version: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_turns: default_max_turns(),
            fallback_models: Vec::new(),
            retry_policy: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                // Azure has no global endpoint; validate() rejects this case.
                LlmProvider::AzureOpenAi => "",
            }
        }
    }

    pub fn api_version(&self) -> &str {
        self.api_version
            .as_deref()
            .unwrap_or(DEFAULT_AZURE_API_VERSION)
    }

    /// Fill `api_key` from `api_key_env` when it is empty, recursing into fallbacks.
    pub fn resolve_api_key(&mut self) -> ConcertoResult<()> {
        if self.api_key.is_empty() {
            if let Some(var) = &self.api_key_env {
                self.api_key = std::env::var(var).map_err(|_| {
                    ConcertoError::Config(format!(
                        "environment variable '{var}' for model '{}' is not set",
                        self.model_id
                    ))
                })?;
            }
        }
        for fallback in &mut self.fallback_models {
            fallback.resolve_api_key()?;
        }
        Ok(())
    }

    /// Reject configurations that cannot possibly reach a model.
    pub fn validate(&self) -> ConcertoResult<()> {
        if self.model_id.trim().is_empty() {
            return Err(ConcertoError::Config("model_id must not be empty".into()));
        }
        if self.api_key.is_empty() {
            return Err(ConcertoError::Config(format!(
                "no API key for model '{}' (set api_key or api_key_env)",
                self.model_id
            )));
        }
        if self.provider == LlmProvider::AzureOpenAi && self.api_base_url.is_none() {
            return Err(ConcertoError::Config(format!(
                "azure_openai model '{}' requires api_base_url",
                self.model_id
            )));
        }
        if self.max_turns == 0 {
            return Err(ConcertoError::Config("max_turns must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConcertoError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        for fallback in &self.fallback_models {
            fallback.validate()?;
        }
        Ok(())
    }
}

/// Declarative description of one agent: identity, instructions, and an
/// optional model override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instructions: String,
    /// Overrides the shared model for this agent only.
    #[serde(default)]
    pub model: Option<ModelConfig>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            model: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> ConcertoResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConcertoError::Config("agent name must not be empty".into()));
        }
        if let Some(model) = &self.model {
            model.validate()?;
        }
        Ok(())
    }
}
