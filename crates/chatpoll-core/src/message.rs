use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The participant that authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// A human end-user.
    User,
    /// The remote agent. Servers that say `assistant` map here too.
    Agent,
    /// Any role this client does not know (`system`, `tool`, ...).
    Other,
}

impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "user" => Sender::User,
            "agent" | "assistant" => Sender::Agent,
            _ => Sender::Other,
        })
    }
}

/// A single message received from (or sent to) a chat session.
///
/// The `id` is opaque: it is only ever compared for equality and handed back
/// to the server as a polling cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            agent_type: None,
        }
    }

    /// Creates a message with [`Sender::User`].
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Sender::User, content)
    }

    /// Creates a message with [`Sender::Agent`].
    pub fn agent(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Sender::Agent, content)
    }

    pub fn is_from_agent(&self) -> bool {
        self.sender == Sender::Agent
    }
}
