use crate::skill::{Skill, SkillDescriptor};
use concerto_core::{ConcertoError, ConcertoResult, ToolCall, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Central registry of the capabilities an agent may expose to its model.
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Register a skill. A skill with the same name is replaced.
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.descriptor().name.clone();
        if self.skills.insert(name.clone(), skill).is_some() {
            warn!(skill = %name, "Replaced previously registered skill");
        } else {
            info!(skill = %name, "Registered skill");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }

    /// Descriptors sorted by name, so request bodies are stable.
    pub fn list_descriptors(&self) -> Vec<&SkillDescriptor> {
        let mut descriptors: Vec<_> = self.skills.values().map(|s| s.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Execute a tool call, checking required arguments first.
    ///
    /// An unknown skill is an error. Missing arguments come back as an error
    /// [`ToolResult`] so the model can correct itself on the next turn.
    pub async fn execute(&self, call: ToolCall) -> ConcertoResult<ToolResult> {
        let skill = self
            .skills
            .get(&call.name)
            .ok_or_else(|| ConcertoError::Skill(format!("Unknown skill: {}", call.name)))?;

        let missing: Vec<&str> = skill
            .descriptor()
            .required_parameters()
            .into_iter()
            .filter(|param| call.arguments.get(param).is_none())
            .collect();

        if !missing.is_empty() {
            warn!(skill = %call.name, missing = ?missing, "Rejected tool call with missing arguments");
            return Ok(ToolResult::error(
                &call.id,
                format!(
                    "Missing required argument(s) for '{}': {}",
                    call.name,
                    missing.join(", ")
                ),
            ));
        }

        skill.execute(call).await
    }

    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
