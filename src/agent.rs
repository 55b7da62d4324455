//! Agent drafts and the persisted `Agent` record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::compiler::CompiledKnowledge;

/// Prefix marking a tone that should mirror the user's language.
pub const AUTO_MATCH_PREFIX: &str = "[AUTO-MATCH] ";

/// Errors promoting a draft to an agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Agents must be named.
    #[error("agent name is required")]
    MissingName,
    /// A draft cannot be saved before instructions are assembled.
    #[error("agent has no assembled instructions")]
    MissingInstructions,
}

/// Identity and behaviour fields shared by drafts and agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFields {
    /// Agent or company name.
    pub name: String,
    /// Company website.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Role description.
    #[serde(default)]
    pub description: String,
    /// Interaction flow.
    #[serde(default, rename = "conversationFlow")]
    pub flow: String,
    /// Tone / language mode. A value starting with [`AUTO_MATCH_PREFIX`]
    /// asks the agent to reply in the user's language.
    #[serde(default, rename = "languageStyle")]
    pub tone: String,
}

/// In-progress form state. Never persisted directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentDraft {
    /// Identity fields.
    pub identity: IdentityFields,
    /// Operational rules.
    pub rules: String,
    /// Compiled knowledge buffer.
    pub knowledge: CompiledKnowledge,
}

impl AgentDraft {
    /// Reopen a saved agent for editing.
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            identity: agent.identity.clone(),
            rules: agent.rules.clone(),
            knowledge: CompiledKnowledge::parse(&agent.company_info),
        }
    }

    /// Promote the draft to an agent. Editing an `existing` agent keeps its
    /// id and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the name or the instructions are blank.
    pub fn promote(
        &self,
        instructions: &str,
        existing: Option<&Agent>,
    ) -> Result<Agent, AgentError> {
        if self.identity.name.trim().is_empty() {
            return Err(AgentError::MissingName);
        }
        if instructions.trim().is_empty() {
            return Err(AgentError::MissingInstructions);
        }
        let (id, created_at) = match existing {
            Some(agent) => (agent.id.clone(), agent.created_at),
            None => (
                Uuid::new_v4().simple().to_string(),
                chrono::Utc::now().timestamp_millis(),
            ),
        };
        Ok(Agent {
            id,
            identity: self.identity.clone(),
            rules: self.rules.clone(),
            company_info: self.knowledge.render(),
            system_prompt: instructions.to_owned(),
            created_at,
        })
    }
}

/// A saved agent. Replaced as a whole on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Stable id.
    pub id: String,
    /// Identity fields, flattened into the record.
    #[serde(flatten)]
    pub identity: IdentityFields,
    /// Operational rules.
    #[serde(default)]
    pub rules: String,
    /// Knowledge buffer snapshot in delimited text form.
    #[serde(default)]
    pub company_info: String,
    /// Assembled instruction text.
    pub system_prompt: String,
    /// Creation time, Unix milliseconds.
    pub created_at: i64,
}

impl Agent {
    /// Display name.
    pub fn name(&self) -> &str {
        &self.identity.name
    }
}
