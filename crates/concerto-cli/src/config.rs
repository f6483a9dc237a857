use anyhow::Context;
use concerto_agent::{AgentProfile, ModelConfig};
use concerto_orchestrator::RuntimeConfig;
use serde::Deserialize;
use std::path::Path;

/// Contents of `concerto.toml`.
#[derive(Debug, Deserialize)]
pub struct ConcertoConfig {
    /// Model shared by every agent without its own `model` table.
    pub model: ModelConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}

impl ConcertoConfig {
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(source)?;
        if let Some(unnamed) = config.agents.iter().position(|a| a.name.trim().is_empty()) {
            anyhow::bail!("agents[{unnamed}] has an empty name");
        }
        Ok(config)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Resolve API keys from the environment and validate every model.
    ///
    /// Only commands that talk to a model need this.
    pub fn prepare_models(&mut self) -> anyhow::Result<()> {
        self.model.resolve_api_key()?;
        self.model.validate()?;
        for agent in &mut self.agents {
            if let Some(model) = agent.model.as_mut() {
                model.resolve_api_key()?;
            }
            agent
                .validate()
                .with_context(|| format!("Invalid model for agent '{}'", agent.name))?;
        }
        Ok(())
    }

    /// Agents selected by name, or all of them when `names` is empty.
    pub fn select_agents(&self, names: &[String]) -> anyhow::Result<Vec<&AgentProfile>> {
        if names.is_empty() {
            return Ok(self.agents.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.agents
                    .iter()
                    .find(|agent| &agent.name == name)
                    .with_context(|| format!("No agent named '{name}' in config"))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use concerto_agent::LlmProvider;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [model]
        provider = "azure_openai"
        model_id = "gpt-4o"
        api_base_url = "https://example.openai.azure.com"
        api_key_env = "CONCERTO_TEST_AZURE_KEY"

        [runtime]
        max_concurrent_workers = 8

        [[agents]]
        name = "PhysicsExpert"
        description = "Answers physics questions"
        instructions = "You are an expert in physics."

        [[agents]]
        name = "ChemistryExpert"
        instructions = "You are an expert in chemistry."

        [agents.model]
        provider = "openai"
        model_id = "gpt-4o-mini"
        api_key = "sk-inline"
    "#;

    #[test]
    fn test_parse_sample() {
        let config = ConcertoConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.model.provider, LlmProvider::AzureOpenAi);
        assert_eq!(config.runtime.max_concurrent_workers, Some(8));
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].description, "Answers physics questions");
        assert!(config.agents[0].model.is_none());
        assert_eq!(
            config.agents[1].model.as_ref().unwrap().model_id,
            "gpt-4o-mini"
        );
    }

    #[test]
    fn test_runtime_and_agents_optional() {
        let config = ConcertoConfig::from_toml_str(
            r#"
            [model]
            provider = "openai"
            model_id = "gpt-4o"
            "#,
        )
        .unwrap();
        assert!(config.agents.is_empty());
        assert!(config.runtime.max_concurrent_workers.is_none());
    }

    #[test]
    fn test_prepare_models_reads_env() {
        let mut config = ConcertoConfig::from_toml_str(SAMPLE).unwrap();
        std::env::set_var("CONCERTO_TEST_AZURE_KEY", "azure-secret");
        config.prepare_models().unwrap();
        assert_eq!(config.model.api_key, "azure-secret");
    }

    #[test]
    fn test_prepare_models_missing_key_fails() {
        let mut config = ConcertoConfig::from_toml_str(
            r#"
            [model]
            provider = "openai"
            model_id = "gpt-4o"
            api_key_env = "CONCERTO_TEST_UNSET_KEY"
            "#,
        )
        .unwrap();
        let err = config.prepare_models().unwrap_err();
        assert!(err.to_string().contains("CONCERTO_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_empty_agent_name_rejected() {
        let err = ConcertoConfig::from_toml_str(
            r#"
            [model]
            provider = "openai"
            model_id = "gpt-4o"

            [[agents]]
            name = " "
            instructions = "x"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("agents[0]"));
    }

    #[test]
    fn test_select_agents() {
        let config = ConcertoConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.select_agents(&[]).unwrap().len(), 2);

        let picked = config
            .select_agents(&["ChemistryExpert".to_string()])
            .unwrap();
        assert_eq!(picked[0].name, "ChemistryExpert");

        let err = config.select_agents(&["Nobody".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Nobody"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ConcertoConfig::load(file.path()).await.unwrap();
        assert_eq!(config.agents[0].name, "PhysicsExpert");

        let missing = ConcertoConfig::load(Path::new("/nonexistent/concerto.toml")).await;
        assert!(missing.unwrap_err().to_string().contains("Failed to read"));
    }
}
