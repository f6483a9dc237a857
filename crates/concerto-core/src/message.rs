use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The role of the participant that authored a [`Message`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user, or the orchestrator speaking on their behalf.
    User,
    /// A model-backed agent.
    Assistant,
    /// A system-level instruction or prompt.
    System,
    /// Output produced by a capability invocation.
    Tool,
}

/// A single message exchanged within a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// The role of the message author.
    pub role: Role,
    /// Display name of the author (an agent name in multi-agent threads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The textual content of the message.
    pub content: String,
    /// The conversation thread this message belongs to.
    pub thread_id: Uuid,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary key-value metadata attached to the message.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Creates a new message with the given role, content, and thread ID.
    pub fn new(role: Role, content: impl Into<String>, thread_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            name: None,
            content: content.into(),
            thread_id,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>, thread_id: Uuid) -> Self {
        Self::new(Role::User, content, thread_id)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>, thread_id: Uuid) -> Self {
        Self::new(Role::Assistant, content, thread_id)
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>, thread_id: Uuid) -> Self {
        Self::new(Role::System, content, thread_id)
    }

    /// Attach the author's display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
