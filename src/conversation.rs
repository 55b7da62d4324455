//! Talking to a saved agent: demo chat and social inbox replies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::providers::{OracleError, OracleRequest, TextOracle};

/// Default extra instruction for social replies.
pub const DEFAULT_REPLY_INSTRUCTION: &str = "Reply naturally based on your persona.";

const SOCIAL_OVERRIDE: &str = "[OVERRIDE FOR SOCIAL MEDIA PLATFORM]\n\
You are responding on a social media platform (Instagram DM / Facebook Messenger / Twitter).\n\
Keep it concise. No long emails. Use appropriate line breaks.\n\
If the user didn't ask for a long explanation, keep it conversational.";

/// Where the reply will be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Interactive demo chat.
    Demo,
    /// Social inbox; replies are kept short.
    Social,
}

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human.
    User,
    /// The agent.
    Model,
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker.
    pub role: ChatRole,
    /// Message text.
    pub text: String,
}

impl ChatTurn {
    /// A user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// An agent turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Answers as a saved agent.
#[derive(Clone)]
pub struct Responder {
    oracle: Arc<dyn TextOracle>,
    model: String,
}

fn render_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| match turn.role {
            ChatRole::User => format!("User: {}", turn.text),
            ChatRole::Model => format!("Agent: {}", turn.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Responder {
    /// Create a responder using `model`.
    pub fn new(oracle: Arc<dyn TextOracle>, model: impl Into<String>) -> Self {
        Self {
            oracle,
            model: model.into(),
        }
    }

    /// The request for a reply.
    pub fn build_request(
        &self,
        agent: &Agent,
        history: &[ChatTurn],
        message: &str,
        instruction: Option<&str>,
        channel: Channel,
    ) -> OracleRequest {
        let system = match channel {
            Channel::Demo => agent.system_prompt.clone(),
            Channel::Social => format!("{}\n\n{SOCIAL_OVERRIDE}", agent.system_prompt),
        };
        let instruction = instruction.map(str::trim).filter(|i| !i.is_empty());

        let prompt = match (channel, history.is_empty(), instruction) {
            (Channel::Demo, true, None) => message.to_owned(),
            _ => format!(
                "CONVERSATION HISTORY:\n{history}\n\n\
                 LATEST MESSAGE FROM USER:\n\"{message}\"\n\n\
                 EXTRA INSTRUCTION: {extra}",
                history = render_history(history),
                extra = instruction.unwrap_or(DEFAULT_REPLY_INSTRUCTION),
            ),
        };
        OracleRequest::text(self.model.clone(), prompt).with_system(system)
    }

    /// Reply to `message` as `agent`. Empty oracle output is returned as an
    /// empty string.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the oracle call fails.
    pub async fn reply(
        &self,
        agent: &Agent,
        history: &[ChatTurn],
        message: &str,
        instruction: Option<&str>,
        channel: Channel,
    ) -> Result<String, OracleError> {
        let request = self.build_request(agent, history, message, instruction, channel);
        let response = self.oracle.generate(request).await?;
        tracing::debug!(agent_id = %agent.id, ?channel, "reply generated");
        Ok(response.text.trim().to_owned())
    }
}
